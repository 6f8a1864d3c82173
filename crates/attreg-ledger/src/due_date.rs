//! Due date selection for new dues postings.

use attreg_core::Timestamp;

/// Decides when a newly posted due falls due.
pub trait DueDatePolicy: Send + Sync + std::fmt::Debug {
    /// Due date for a posting made at `now`.
    fn due_date(&self, now: Timestamp) -> Timestamp;
}

/// Dues fall due immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameDay;

impl DueDatePolicy for SameDay {
    fn due_date(&self, now: Timestamp) -> Timestamp {
        now
    }
}

/// Dues fall due a fixed number of days after posting.
#[derive(Debug, Clone, Copy)]
pub struct DaysAfter(pub u32);

impl DueDatePolicy for DaysAfter {
    fn due_date(&self, now: Timestamp) -> Timestamp {
        now.plus_days(self.0)
    }
}
