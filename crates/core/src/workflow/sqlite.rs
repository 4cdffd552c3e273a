//! SQLite-backed workflow engine.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::store::{
    Directory, MachineRepository, NewProcess, NewQueue, ProcessRepository, QueueRepository,
    Workflow,
};
use super::types::{
    CreateProcessRequest, CreateQueueRequest, Employee, EmployeeId, LaundryProcess, Machine,
    MachineFilter, MachineId, MachineReleased, MachineStatus, MachineType, MachinesAssigned, Order,
    OrderId, PickupConfirmed, ProcessAdvanced, ProcessCreated, ProcessDetails, ProcessId,
    ProcessStatus, Queue, QueueAccepted, QueueAssignment, QueueDetails, QueueFilter, QueueId,
    QueueStatus, QueueType,
};
use super::{allocator, process, queue, validate_id, CascadeRule, ProcessPolicy, WorkflowError};
use crate::audit::{AuditEvent, AuditHandle};
use crate::metrics;

const QUEUE_COLUMNS: &str = "id, queue_type, status, order_id, time_slot_id, created_at, updated_at";
const PROCESS_COLUMNS: &str =
    "id, order_id, employee_id, status, description, status_note, started_at, ended_at, updated_at";

/// Workflow engine persisting to SQLite.
///
/// Every mutating operation runs in one IMMEDIATE transaction, so the status
/// change, the machine links and any cascaded queue commit together or not at
/// all. Audit events and counters are recorded only after the commit.
pub struct SqliteWorkflow {
    conn: Mutex<Connection>,
    policy: ProcessPolicy,
    audit: Option<AuditHandle>,
}

impl SqliteWorkflow {
    /// Open the database at `path`, creating the file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, WorkflowError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory engine (useful for testing).
    pub fn in_memory() -> Result<Self, WorkflowError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, WorkflowError> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            policy: ProcessPolicy::default(),
            audit: None,
        })
    }

    pub fn with_policy(mut self, policy: ProcessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn policy(&self) -> ProcessPolicy {
        self.policy
    }

    fn initialize_schema(conn: &Connection) -> Result<(), WorkflowError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY,
                customer_id INTEGER NOT NULL,
                address TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS employees (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS machines (
                id INTEGER PRIMARY KEY,
                machine_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'available'
            );

            CREATE TABLE IF NOT EXISTS queues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_type TEXT NOT NULL,
                status TEXT NOT NULL,
                order_id INTEGER NOT NULL REFERENCES orders(id),
                time_slot_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- At most one non-terminal queue per order and type.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_queues_one_open
                ON queues(order_id, queue_type)
                WHERE status IN ('waiting', 'pickup_in_progress', 'delivery_in_progress');
            CREATE INDEX IF NOT EXISTS idx_queues_type_status ON queues(queue_type, status);

            CREATE TABLE IF NOT EXISTS queue_assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_id INTEGER NOT NULL REFERENCES queues(id),
                employee_id INTEGER NOT NULL REFERENCES employees(id),
                assigned_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_queue_assignments_queue ON queue_assignments(queue_id);

            CREATE TABLE IF NOT EXISTS laundry_processes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL REFERENCES orders(id),
                employee_id INTEGER NOT NULL REFERENCES employees(id),
                status TEXT NOT NULL,
                description TEXT NOT NULL,
                status_note TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_laundry_processes_order ON laundry_processes(order_id);

            -- A machine is linked to at most one process.
            CREATE TABLE IF NOT EXISTS process_machines (
                process_id INTEGER NOT NULL REFERENCES laundry_processes(id),
                machine_id INTEGER NOT NULL UNIQUE REFERENCES machines(id),
                PRIMARY KEY (process_id, machine_id)
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, WorkflowError> {
        self.conn
            .lock()
            .map_err(|_| WorkflowError::Database("connection lock poisoned".to_string()))
    }

    /// Run `f` in a write transaction. Any error rolls everything back.
    fn transaction<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&SqliteRepository<'_>) -> Result<T, WorkflowError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&SqliteRepository { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    fn read<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        F: FnOnce(&SqliteRepository<'_>) -> Result<T, WorkflowError>,
    {
        let conn = self.lock()?;
        f(&SqliteRepository { conn: &conn })
    }

    /// Record an order from the intake side. Returns false if it already existed.
    pub fn register_order(&self, order: &Order) -> Result<bool, WorkflowError> {
        validate_id("order_id", order.id)?;
        validate_id("customer_id", order.customer_id)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO orders (id, customer_id, address) VALUES (?1, ?2, ?3)",
            params![order.id, order.customer_id, order.address],
        )?;
        Ok(inserted == 1)
    }

    /// Record a staff member. Returns false if they already existed.
    pub fn register_employee(&self, employee: &Employee) -> Result<bool, WorkflowError> {
        validate_id("employee_id", employee.id)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO employees (id, name) VALUES (?1, ?2)",
            params![employee.id, employee.name],
        )?;
        Ok(inserted == 1)
    }

    /// Add a machine to the inventory as available. Existing machines keep
    /// their current status.
    pub fn register_machine(
        &self,
        machine_id: MachineId,
        machine_type: MachineType,
    ) -> Result<bool, WorkflowError> {
        validate_id("machine_id", machine_id)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO machines (id, machine_type, status) VALUES (?1, ?2, ?3)",
            params![
                machine_id,
                machine_type.as_str(),
                MachineStatus::Available.as_str()
            ],
        )?;
        Ok(inserted == 1)
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(ref audit) = self.audit {
            audit.try_emit(event);
        }
    }

    fn record_queue_transition(&self, queue: &Queue, from: QueueStatus) {
        metrics::QUEUE_TRANSITIONS
            .with_label_values(&[queue.queue_type.as_str(), queue.status.as_str()])
            .inc();
        self.emit(AuditEvent::QueueStatusChanged {
            queue_id: queue.id,
            order_id: queue.order_id,
            from_status: from,
            to_status: queue.status,
        });
    }

    fn record_queue_created(&self, queue: &Queue, cascade: Option<CascadeRule>) {
        if let Some(rule) = cascade {
            metrics::CASCADE_QUEUES_CREATED
                .with_label_values(&[rule.as_str()])
                .inc();
        }
        self.emit(AuditEvent::QueueCreated {
            queue_id: queue.id,
            order_id: queue.order_id,
            queue_type: queue.queue_type,
            time_slot_id: queue.time_slot_id,
            cascade,
        });
    }

    fn record_released(&self, process_id: ProcessId, order_id: OrderId, machines: &[Machine]) {
        metrics::MACHINES_RELEASED.inc_by(machines.len() as u64);
        for machine in machines {
            self.emit(AuditEvent::MachineReleased {
                process_id,
                order_id,
                machine_id: machine.id,
            });
        }
    }
}

impl Workflow for SqliteWorkflow {
    fn create_queue(&self, request: CreateQueueRequest) -> Result<Queue, WorkflowError> {
        let queue = self.transaction(|repo| queue::create(repo, &request, Utc::now()))?;
        self.record_queue_created(&queue, None);
        Ok(queue)
    }

    fn accept_queue(
        &self,
        queue_id: QueueId,
        employee_id: EmployeeId,
    ) -> Result<QueueAccepted, WorkflowError> {
        let accepted =
            self.transaction(|repo| queue::accept(repo, queue_id, employee_id, Utc::now()))?;

        metrics::QUEUE_TRANSITIONS
            .with_label_values(&[
                accepted.queue.queue_type.as_str(),
                accepted.queue.status.as_str(),
            ])
            .inc();
        self.emit(AuditEvent::QueueAccepted {
            queue_id: accepted.queue.id,
            order_id: accepted.queue.order_id,
            employee_id,
            status: accepted.queue.status,
        });

        Ok(accepted)
    }

    fn confirm_pickup(&self, queue_id: QueueId) -> Result<PickupConfirmed, WorkflowError> {
        let confirmed = self.transaction(|repo| queue::confirm_pickup(repo, queue_id, Utc::now()))?;

        self.record_queue_transition(&confirmed.queue, QueueStatus::PickupInProgress);
        if let Some(ref delivery) = confirmed.delivery_queue {
            self.record_queue_created(delivery, Some(CascadeRule::PickupDone));
        }

        Ok(confirmed)
    }

    fn confirm_delivery(&self, queue_id: QueueId) -> Result<Queue, WorkflowError> {
        let queue = self.transaction(|repo| queue::confirm_delivery(repo, queue_id, Utc::now()))?;
        self.record_queue_transition(&queue, QueueStatus::DeliveryInProgress);
        Ok(queue)
    }

    fn get_queue(&self, queue_id: QueueId) -> Result<Option<QueueDetails>, WorkflowError> {
        self.read(|repo| {
            repo.find_queue(queue_id)?
                .map(|q| queue::details(repo, q))
                .transpose()
        })
    }

    fn list_queues(&self, filter: &QueueFilter) -> Result<Vec<QueueDetails>, WorkflowError> {
        self.read(|repo| {
            repo.list_queues(filter)?
                .into_iter()
                .map(|q| queue::details(repo, q))
                .collect()
        })
    }

    fn count_queues(&self, filter: &QueueFilter) -> Result<i64, WorkflowError> {
        self.read(|repo| repo.count_queues(filter))
    }

    fn create_process(
        &self,
        request: CreateProcessRequest,
    ) -> Result<ProcessCreated, WorkflowError> {
        let created = self.transaction(|repo| process::create(repo, &request, Utc::now()))?;

        self.emit(AuditEvent::ProcessCreated {
            process_id: created.process.id,
            order_id: created.process.order_id,
            employee_id: created.process.employee_id,
            description: created.process.description.clone(),
        });
        if let Some(ref pickup) = created.pickup_queue {
            self.record_queue_created(pickup, Some(CascadeRule::ProcessCreated));
        }

        Ok(created)
    }

    fn advance_process(
        &self,
        process_id: ProcessId,
        target: ProcessStatus,
        note: Option<String>,
    ) -> Result<ProcessAdvanced, WorkflowError> {
        let policy = self.policy;
        let advanced = self.transaction(|repo| {
            process::advance(
                repo,
                &policy,
                process_id,
                target,
                note.as_deref(),
                Utc::now(),
            )
        })?;

        let p = &advanced.process;
        metrics::PROCESS_TRANSITIONS
            .with_label_values(&[p.status.as_str()])
            .inc();
        self.emit(AuditEvent::ProcessStatusChanged {
            process_id: p.id,
            order_id: p.order_id,
            from_status: advanced.previous_status,
            to_status: p.status,
            note,
        });
        self.record_released(p.id, p.order_id, &advanced.released_machines);
        if let Some(ref delivery) = advanced.delivery_queue {
            self.record_queue_created(delivery, Some(CascadeRule::ProcessCompleted));
        }

        Ok(advanced)
    }

    fn get_process(&self, process_id: ProcessId) -> Result<Option<ProcessDetails>, WorkflowError> {
        self.read(|repo| {
            let Some(process) = repo.find_process(process_id)? else {
                return Ok(None);
            };
            let machines = repo.machines_for_process(process.id)?;
            Ok(Some(ProcessDetails { process, machines }))
        })
    }

    fn assign_machines(
        &self,
        process_id: ProcessId,
        machine_ids: &[MachineId],
    ) -> Result<MachinesAssigned, WorkflowError> {
        let assigned = self.transaction(|repo| allocator::assign(repo, process_id, machine_ids))?;

        if !assigned.added.is_empty() || !assigned.removed.is_empty() {
            metrics::MACHINES_RELEASED.inc_by(assigned.removed.len() as u64);
            self.emit(AuditEvent::MachinesAssigned {
                process_id: assigned.process_id,
                order_id: assigned.order_id,
                added: assigned.added.clone(),
                removed: assigned.removed.clone(),
            });
        } else {
            debug!(process_id, "Machine set unchanged");
        }

        Ok(assigned)
    }

    fn release_machine(
        &self,
        process_id: ProcessId,
        machine_id: MachineId,
    ) -> Result<MachineReleased, WorkflowError> {
        let released =
            self.transaction(|repo| allocator::release(repo, process_id, machine_id))?;
        self.record_released(
            released.process_id,
            released.order_id,
            std::slice::from_ref(&released.machine),
        );
        Ok(released)
    }

    fn process_machines(&self, process_id: ProcessId) -> Result<Vec<Machine>, WorkflowError> {
        validate_id("process_id", process_id)?;
        self.read(|repo| {
            repo.find_process(process_id)?
                .ok_or_else(|| WorkflowError::not_found("process", process_id))?;
            repo.machines_for_process(process_id)
        })
    }

    fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, WorkflowError> {
        self.read(|repo| repo.list_machines(filter))
    }
}

// =============================================================================
// Repository view over one connection or transaction
// =============================================================================

/// Repository implementation bound to a borrowed connection. Built per
/// operation, so everything it does lands in the caller's transaction.
struct SqliteRepository<'a> {
    conn: &'a Connection,
}

impl SqliteRepository<'_> {
    fn build_queue_where(filter: &QueueFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(queue_type) = filter.queue_type {
            conditions.push("queue_type = ?");
            params.push(Box::new(queue_type.as_str()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(order_id) = filter.order_id {
            conditions.push("order_id = ?");
            params.push(Box::new(order_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_queue(row: &rusqlite::Row) -> rusqlite::Result<Queue> {
        Ok(Queue {
            id: row.get(0)?,
            queue_type: decode(row, 1, QueueType::from_code)?,
            status: decode(row, 2, QueueStatus::from_code)?,
            order_id: row.get(3)?,
            time_slot_id: row.get(4)?,
            created_at: timestamp(row, 5)?,
            updated_at: timestamp(row, 6)?,
        })
    }

    fn row_to_process(row: &rusqlite::Row) -> rusqlite::Result<LaundryProcess> {
        let ended_at = match row.get::<_, Option<String>>(7)? {
            Some(raw) => Some(parse_timestamp(7, &raw)?),
            None => None,
        };

        Ok(LaundryProcess {
            id: row.get(0)?,
            order_id: row.get(1)?,
            employee_id: row.get(2)?,
            status: decode(row, 3, ProcessStatus::from_code)?,
            description: row.get(4)?,
            status_note: row.get(5)?,
            started_at: timestamp(row, 6)?,
            ended_at,
            updated_at: timestamp(row, 8)?,
        })
    }

    fn row_to_machine(row: &rusqlite::Row) -> rusqlite::Result<Machine> {
        Ok(Machine {
            id: row.get(0)?,
            machine_type: decode(row, 1, MachineType::from_code)?,
            status: decode(row, 2, MachineStatus::from_code)?,
        })
    }

    fn row_to_assignment(row: &rusqlite::Row) -> rusqlite::Result<QueueAssignment> {
        Ok(QueueAssignment {
            id: row.get(0)?,
            queue_id: row.get(1)?,
            employee_id: row.get(2)?,
            assigned_at: timestamp(row, 3)?,
        })
    }
}

/// Read a stored code column back into its enum.
fn decode<T>(row: &rusqlite::Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown code '{}'", raw).into())
    })
}

fn timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(idx, &raw)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl Directory for SqliteRepository<'_> {
    fn find_order(&self, id: OrderId) -> Result<Option<Order>, WorkflowError> {
        let order = self
            .conn
            .query_row(
                "SELECT id, customer_id, address FROM orders WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Order {
                        id: row.get(0)?,
                        customer_id: row.get(1)?,
                        address: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(order)
    }

    fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, WorkflowError> {
        let employee = self
            .conn
            .query_row(
                "SELECT id, name FROM employees WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Employee {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(employee)
    }
}

impl QueueRepository for SqliteRepository<'_> {
    fn insert_queue(&self, queue: &NewQueue, now: DateTime<Utc>) -> Result<Queue, WorkflowError> {
        let status = QueueStatus::Waiting;
        self.conn.execute(
            "INSERT INTO queues (queue_type, status, order_id, time_slot_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                queue.queue_type.as_str(),
                status.as_str(),
                queue.order_id,
                queue.time_slot_id,
                now.to_rfc3339(),
            ],
        )?;

        Ok(Queue {
            id: self.conn.last_insert_rowid(),
            queue_type: queue.queue_type,
            status,
            order_id: queue.order_id,
            time_slot_id: queue.time_slot_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn find_queue(&self, id: QueueId) -> Result<Option<Queue>, WorkflowError> {
        let sql = format!("SELECT {} FROM queues WHERE id = ?1", QUEUE_COLUMNS);
        let queue = self
            .conn
            .query_row(&sql, params![id], Self::row_to_queue)
            .optional()?;
        Ok(queue)
    }

    fn find_open_queue(
        &self,
        order_id: OrderId,
        queue_type: QueueType,
    ) -> Result<Option<Queue>, WorkflowError> {
        let sql = format!(
            "SELECT {} FROM queues
             WHERE order_id = ?1 AND queue_type = ?2 AND status IN (?3, ?4, ?5)
             ORDER BY id DESC LIMIT 1",
            QUEUE_COLUMNS
        );
        let [a, b, c] = QueueStatus::OPEN;
        let queue = self
            .conn
            .query_row(
                &sql,
                params![order_id, queue_type.as_str(), a.as_str(), b.as_str(), c.as_str()],
                Self::row_to_queue,
            )
            .optional()?;
        Ok(queue)
    }

    fn transition_queue(
        &self,
        id: QueueId,
        from: QueueStatus,
        to: QueueStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        let changed = self.conn.execute(
            "UPDATE queues SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![to.as_str(), now.to_rfc3339(), id, from.as_str()],
        )?;
        Ok(changed == 1)
    }

    fn insert_assignment(
        &self,
        queue_id: QueueId,
        employee_id: EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<QueueAssignment, WorkflowError> {
        self.conn.execute(
            "INSERT INTO queue_assignments (queue_id, employee_id, assigned_at) VALUES (?1, ?2, ?3)",
            params![queue_id, employee_id, now.to_rfc3339()],
        )?;

        Ok(QueueAssignment {
            id: self.conn.last_insert_rowid(),
            queue_id,
            employee_id,
            assigned_at: now,
        })
    }

    fn find_assignment(&self, queue_id: QueueId) -> Result<Option<QueueAssignment>, WorkflowError> {
        let assignment = self
            .conn
            .query_row(
                "SELECT id, queue_id, employee_id, assigned_at FROM queue_assignments
                 WHERE queue_id = ?1 ORDER BY id DESC LIMIT 1",
                params![queue_id],
                Self::row_to_assignment,
            )
            .optional()?;
        Ok(assignment)
    }

    fn list_queues(&self, filter: &QueueFilter) -> Result<Vec<Queue>, WorkflowError> {
        let (where_clause, mut params) = Self::build_queue_where(filter);
        let sql = format!(
            "SELECT {} FROM queues {} ORDER BY id ASC LIMIT ? OFFSET ?",
            QUEUE_COLUMNS, where_clause
        );

        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let queues = stmt
            .query_map(param_refs.as_slice(), Self::row_to_queue)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(queues)
    }

    fn count_queues(&self, filter: &QueueFilter) -> Result<i64, WorkflowError> {
        let (where_clause, params) = Self::build_queue_where(filter);
        let sql = format!("SELECT COUNT(*) FROM queues {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count = self
            .conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }
}

impl ProcessRepository for SqliteRepository<'_> {
    fn insert_process(
        &self,
        process: &NewProcess,
        now: DateTime<Utc>,
    ) -> Result<LaundryProcess, WorkflowError> {
        let status = ProcessStatus::Pending;
        self.conn.execute(
            "INSERT INTO laundry_processes (order_id, employee_id, status, description, started_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                process.order_id,
                process.employee_id,
                status.as_str(),
                process.description,
                now.to_rfc3339(),
            ],
        )?;

        Ok(LaundryProcess {
            id: self.conn.last_insert_rowid(),
            order_id: process.order_id,
            employee_id: process.employee_id,
            status,
            description: process.description.clone(),
            status_note: None,
            started_at: now,
            ended_at: None,
            updated_at: now,
        })
    }

    fn find_process(&self, id: ProcessId) -> Result<Option<LaundryProcess>, WorkflowError> {
        let sql = format!(
            "SELECT {} FROM laundry_processes WHERE id = ?1",
            PROCESS_COLUMNS
        );
        let process = self
            .conn
            .query_row(&sql, params![id], Self::row_to_process)
            .optional()?;
        Ok(process)
    }

    fn transition_process(
        &self,
        id: ProcessId,
        from: ProcessStatus,
        to: ProcessStatus,
        note: Option<&str>,
        ended_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError> {
        // A missing note or end time keeps the stored value.
        let changed = self.conn.execute(
            "UPDATE laundry_processes
             SET status = ?1,
                 status_note = COALESCE(?2, status_note),
                 ended_at = COALESCE(?3, ended_at),
                 updated_at = ?4
             WHERE id = ?5 AND status = ?6",
            params![
                to.as_str(),
                note,
                ended_at.map(|t| t.to_rfc3339()),
                now.to_rfc3339(),
                id,
                from.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }
}

impl MachineRepository for SqliteRepository<'_> {
    fn find_machine(&self, id: MachineId) -> Result<Option<Machine>, WorkflowError> {
        let machine = self
            .conn
            .query_row(
                "SELECT id, machine_type, status FROM machines WHERE id = ?1",
                params![id],
                Self::row_to_machine,
            )
            .optional()?;
        Ok(machine)
    }

    fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, WorkflowError> {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }
        if let Some(machine_type) = filter.machine_type {
            conditions.push("machine_type = ?");
            params.push(Box::new(machine_type.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT id, machine_type, status FROM machines {} ORDER BY id",
            where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let machines = stmt
            .query_map(param_refs.as_slice(), Self::row_to_machine)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(machines)
    }

    fn machines_for_process(&self, process_id: ProcessId) -> Result<Vec<Machine>, WorkflowError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.machine_type, m.status
             FROM machines m JOIN process_machines pm ON pm.machine_id = m.id
             WHERE pm.process_id = ?1
             ORDER BY m.id",
        )?;
        let machines = stmt
            .query_map(params![process_id], Self::row_to_machine)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(machines)
    }

    fn machine_holder(&self, machine_id: MachineId) -> Result<Option<ProcessId>, WorkflowError> {
        let holder = self
            .conn
            .query_row(
                "SELECT process_id FROM process_machines WHERE machine_id = ?1",
                params![machine_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(holder)
    }

    fn link_machine(
        &self,
        process_id: ProcessId,
        machine_id: MachineId,
    ) -> Result<(), WorkflowError> {
        self.conn.execute(
            "INSERT INTO process_machines (process_id, machine_id) VALUES (?1, ?2)",
            params![process_id, machine_id],
        )?;
        Ok(())
    }

    fn unlink_machine(
        &self,
        process_id: ProcessId,
        machine_id: MachineId,
    ) -> Result<bool, WorkflowError> {
        let removed = self.conn.execute(
            "DELETE FROM process_machines WHERE process_id = ?1 AND machine_id = ?2",
            params![process_id, machine_id],
        )?;
        Ok(removed == 1)
    }

    fn set_machine_status(
        &self,
        machine_id: MachineId,
        from: MachineStatus,
        to: MachineStatus,
    ) -> Result<bool, WorkflowError> {
        let changed = self.conn.execute(
            "UPDATE machines SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.as_str(), machine_id, from.as_str()],
        )?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteWorkflow {
        let wf = SqliteWorkflow::in_memory().unwrap();
        wf.register_order(&Order {
            id: 1,
            customer_id: 100,
            address: "12 Soi Sukhumvit".to_string(),
        })
        .unwrap();
        wf.register_employee(&Employee {
            id: 5,
            name: "Somchai".to_string(),
        })
        .unwrap();
        wf.register_machine(10, MachineType::Washing).unwrap();
        wf.register_machine(20, MachineType::Drying).unwrap();
        wf
    }

    #[test]
    fn test_register_is_idempotent() {
        let wf = seeded();
        let order = Order {
            id: 1,
            customer_id: 999,
            address: "elsewhere".to_string(),
        };
        assert!(!wf.register_order(&order).unwrap());
        assert!(!wf.register_machine(10, MachineType::Drying).unwrap());

        let stored = wf.read(|repo| repo.find_order(1)).unwrap().unwrap();
        assert_eq!(stored.customer_id, 100);
        let machine = wf.read(|repo| repo.find_machine(10)).unwrap().unwrap();
        assert_eq!(machine.machine_type, MachineType::Washing);
    }

    #[test]
    fn test_register_rejects_non_positive_ids() {
        let wf = seeded();
        assert!(matches!(
            wf.register_machine(0, MachineType::Washing),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_open_queue_index_rejects_second_open_queue() {
        let wf = seeded();
        let now = Utc::now();
        let new = NewQueue {
            order_id: 1,
            queue_type: QueueType::Pickup,
            time_slot_id: None,
        };

        let first = wf.transaction(|repo| repo.insert_queue(&new, now)).unwrap();
        let second = wf.transaction(|repo| repo.insert_queue(&new, now));
        assert!(matches!(second, Err(WorkflowError::Conflict(_))));

        // Once the first one is terminal another may be opened.
        wf.transaction(|repo| {
            repo.transition_queue(first.id, QueueStatus::Waiting, QueueStatus::Done, now)
        })
        .unwrap();
        assert!(wf.transaction(|repo| repo.insert_queue(&new, now)).is_ok());
    }

    #[test]
    fn test_conditional_transition_reports_stale_status() {
        let wf = seeded();
        let now = Utc::now();
        let queue = wf
            .transaction(|repo| {
                repo.insert_queue(
                    &NewQueue {
                        order_id: 1,
                        queue_type: QueueType::Delivery,
                        time_slot_id: Some(3),
                    },
                    now,
                )
            })
            .unwrap();

        let moved = wf
            .transaction(|repo| {
                repo.transition_queue(
                    queue.id,
                    QueueStatus::Waiting,
                    QueueStatus::DeliveryInProgress,
                    now,
                )
            })
            .unwrap();
        assert!(moved);

        let again = wf
            .transaction(|repo| {
                repo.transition_queue(
                    queue.id,
                    QueueStatus::Waiting,
                    QueueStatus::DeliveryInProgress,
                    now,
                )
            })
            .unwrap();
        assert!(!again);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let wf = seeded();
        let result: Result<(), WorkflowError> = wf.transaction(|repo| {
            repo.insert_queue(
                &NewQueue {
                    order_id: 1,
                    queue_type: QueueType::Pickup,
                    time_slot_id: None,
                },
                Utc::now(),
            )?;
            repo.set_machine_status(10, MachineStatus::Available, MachineStatus::InUse)?;
            Err(WorkflowError::Conflict("boom".to_string()))
        });
        assert!(result.is_err());

        assert_eq!(wf.count_queues(&QueueFilter::new()).unwrap(), 0);
        let machine = wf.read(|repo| repo.find_machine(10)).unwrap().unwrap();
        assert_eq!(machine.status, MachineStatus::Available);
    }

    #[test]
    fn test_note_is_kept_when_absent() {
        let wf = seeded();
        let now = Utc::now();
        let process = wf
            .transaction(|repo| {
                repo.insert_process(
                    &NewProcess {
                        order_id: 1,
                        employee_id: 5,
                        description: "2kg whites".to_string(),
                    },
                    now,
                )
            })
            .unwrap();

        wf.transaction(|repo| {
            repo.transition_process(
                process.id,
                ProcessStatus::Pending,
                ProcessStatus::Received,
                Some("bag torn"),
                None,
                now,
            )
        })
        .unwrap();
        wf.transaction(|repo| {
            repo.transition_process(
                process.id,
                ProcessStatus::Received,
                ProcessStatus::Washing,
                None,
                None,
                now,
            )
        })
        .unwrap();

        let stored = wf.read(|repo| repo.find_process(process.id)).unwrap().unwrap();
        assert_eq!(stored.status, ProcessStatus::Washing);
        assert_eq!(stored.status_note.as_deref(), Some("bag torn"));
        assert_eq!(stored.ended_at, None);
    }

    #[test]
    fn test_machine_link_is_exclusive() {
        let wf = seeded();
        let now = Utc::now();
        let new = NewProcess {
            order_id: 1,
            employee_id: 5,
            description: String::new(),
        };
        let a = wf.transaction(|repo| repo.insert_process(&new, now)).unwrap();
        let b = wf.transaction(|repo| repo.insert_process(&new, now)).unwrap();

        wf.transaction(|repo| repo.link_machine(a.id, 10)).unwrap();
        let clash = wf.transaction(|repo| repo.link_machine(b.id, 10));
        assert!(matches!(clash, Err(WorkflowError::Conflict(_))));
        assert_eq!(wf.read(|repo| repo.machine_holder(10)).unwrap(), Some(a.id));
    }

    #[test]
    fn test_list_machines_filters() {
        let wf = seeded();
        let washers = wf
            .list_machines(&MachineFilter::new().with_type(MachineType::Washing))
            .unwrap();
        assert_eq!(washers.len(), 1);
        assert_eq!(washers[0].id, 10);

        let busy = wf
            .list_machines(&MachineFilter::new().with_status(MachineStatus::InUse))
            .unwrap();
        assert!(busy.is_empty());
    }

    #[test]
    fn test_file_backed_engine_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laundry.db");

        let wf = SqliteWorkflow::new(&path).unwrap();
        wf.register_machine(1, MachineType::Drying).unwrap();
        drop(wf);

        let reopened = SqliteWorkflow::new(&path).unwrap();
        assert_eq!(reopened.list_machines(&MachineFilter::new()).unwrap().len(), 1);
    }
}
