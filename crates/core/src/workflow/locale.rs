//! Display labels for workflow statuses.
//!
//! Statuses are stored and compared as stable codes. Human-facing labels only
//! exist at the HTTP boundary, and every status maps to exactly one label per
//! locale. Parsing accepts either the code or a label; anything unmapped falls
//! back to the initial status of the machine.

use serde::{Deserialize, Serialize};

use super::types::{ProcessStatus, QueueStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Th,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Th => "th",
        }
    }

    /// Display label of a status in this locale.
    pub fn label<S: StatusLabel>(self, status: S) -> &'static str {
        status.label(self)
    }

    /// Map user input (code or label) back to a status.
    pub fn parse<S: StatusLabel>(self, input: &str) -> S {
        self.try_parse(input).unwrap_or(S::FALLBACK)
    }

    /// Like [`Locale::parse`] but reports unmapped input instead of defaulting.
    pub fn try_parse<S: StatusLabel>(self, input: &str) -> Option<S> {
        let input = input.trim();
        S::ALL.iter().copied().find(|status| {
            status.code().eq_ignore_ascii_case(input) || status.label(self) == input
        })
    }
}

/// A status enumeration with a total label mapping.
pub trait StatusLabel: Copy + 'static {
    const ALL: &'static [Self];
    /// Status used for unmapped input.
    const FALLBACK: Self;

    fn code(&self) -> &'static str;
    fn label(&self, locale: Locale) -> &'static str;
}

impl StatusLabel for QueueStatus {
    const ALL: &'static [Self] = &QueueStatus::ALL;
    const FALLBACK: Self = QueueStatus::Waiting;

    fn code(&self) -> &'static str {
        self.as_str()
    }

    fn label(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, QueueStatus::Waiting) => "Waiting",
            (Locale::En, QueueStatus::PickupInProgress) => "Pickup in progress",
            (Locale::En, QueueStatus::DeliveryInProgress) => "Delivery in progress",
            (Locale::En, QueueStatus::Done) => "Picked up",
            (Locale::En, QueueStatus::Delivered) => "Delivered",
            (Locale::Th, QueueStatus::Waiting) => "รอดำเนินการ",
            (Locale::Th, QueueStatus::PickupInProgress) => "กำลังไปรับผ้า",
            (Locale::Th, QueueStatus::DeliveryInProgress) => "กำลังจัดส่ง",
            (Locale::Th, QueueStatus::Done) => "รับผ้าเรียบร้อย",
            (Locale::Th, QueueStatus::Delivered) => "จัดส่งเรียบร้อย",
        }
    }
}

impl StatusLabel for ProcessStatus {
    const ALL: &'static [Self] = &ProcessStatus::ALL;
    const FALLBACK: Self = ProcessStatus::Pending;

    fn code(&self) -> &'static str {
        self.as_str()
    }

    fn label(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, ProcessStatus::Pending) => "New",
            (Locale::En, ProcessStatus::Received) => "Received",
            (Locale::En, ProcessStatus::Washing) => "Washing",
            (Locale::En, ProcessStatus::Drying) => "Drying",
            (Locale::En, ProcessStatus::Completed) => "Completed",
            (Locale::Th, ProcessStatus::Pending) => "ใหม่",
            (Locale::Th, ProcessStatus::Received) => "รับผ้าแล้ว",
            (Locale::Th, ProcessStatus::Washing) => "กำลังซัก",
            (Locale::Th, ProcessStatus::Drying) => "กำลังอบ",
            (Locale::Th, ProcessStatus::Completed) => "เสร็จสิ้น",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const LOCALES: [Locale; 2] = [Locale::En, Locale::Th];

    fn assert_bijective<S: StatusLabel + PartialEq + std::fmt::Debug>() {
        for locale in LOCALES {
            let labels: HashSet<_> = S::ALL.iter().map(|s| s.label(locale)).collect();
            assert_eq!(labels.len(), S::ALL.len(), "duplicate label in {:?}", locale);

            for status in S::ALL {
                assert_eq!(locale.parse::<S>(status.label(locale)), *status);
                assert_eq!(locale.parse::<S>(status.code()), *status);
            }
        }
    }

    #[test]
    fn test_queue_labels_round_trip() {
        assert_bijective::<QueueStatus>();
    }

    #[test]
    fn test_process_labels_round_trip() {
        assert_bijective::<ProcessStatus>();
    }

    #[test]
    fn test_unmapped_input_falls_back_to_initial_status() {
        assert_eq!(Locale::En.parse::<ProcessStatus>("spinning"), ProcessStatus::Pending);
        assert_eq!(Locale::Th.parse::<QueueStatus>(""), QueueStatus::Waiting);
        assert_eq!(Locale::En.try_parse::<ProcessStatus>("spinning"), None);
    }

    #[test]
    fn test_labels_are_locale_scoped() {
        // A Thai label is not understood under the English locale.
        assert_eq!(Locale::En.try_parse::<ProcessStatus>("กำลังซัก"), None);
        assert_eq!(
            Locale::Th.try_parse::<ProcessStatus>("กำลังซัก"),
            Some(ProcessStatus::Washing)
        );
    }

    #[test]
    fn test_codes_are_case_insensitive() {
        assert_eq!(
            Locale::En.parse::<QueueStatus>("PICKUP_IN_PROGRESS"),
            QueueStatus::PickupInProgress
        );
    }

    #[test]
    fn test_label_helper() {
        assert_eq!(Locale::En.label(ProcessStatus::Pending), "New");
        assert_eq!(Locale::Th.label(QueueStatus::Delivered), "จัดส่งเรียบร้อย");
    }
}
