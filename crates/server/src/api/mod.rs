pub mod audit;
pub mod error;
pub mod handlers;
pub mod machines;
pub mod middleware;
pub mod processes;
pub mod queues;
pub mod routes;

pub use routes::create_router;
