//! Immutable status history row.

use serde::{Deserialize, Serialize};

use attreg_core::{AttendeeId, Status, Timestamp};

/// One recorded status change. Rows are append-only; the latest row per
/// attendee is the attendee's current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Position in the attendee's history, starting at 0.
    pub sequence: u64,
    /// The attendee whose status changed.
    pub attendee_id: AttendeeId,
    /// Resulting status.
    pub status: Status,
    /// Free-text reason supplied by the actor.
    pub comment: String,
    /// When the change was recorded.
    pub changed_at: Timestamp,
}
