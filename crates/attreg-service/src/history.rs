//! Status history log.
//!
//! Thin layer over the repository's history table. The current status of
//! an attendee is the status of its latest row, or `new` when there are no
//! rows.

use std::sync::Arc;

use attreg_core::{AttendeeId, Status, Timestamp};
use attreg_state::StatusChange;

use crate::repository::{AttendeeRepository, RepositoryError};

/// Append-only status history.
#[derive(Clone)]
pub struct StatusHistoryLog {
    repository: Arc<dyn AttendeeRepository>,
}

impl std::fmt::Debug for StatusHistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusHistoryLog")
            .field("repository", &self.repository.adapter_name())
            .finish()
    }
}

impl StatusHistoryLog {
    /// Log backed by `repository`.
    pub fn new(repository: Arc<dyn AttendeeRepository>) -> Self {
        Self { repository }
    }

    /// Record a status change.
    pub async fn append(
        &self,
        id: AttendeeId,
        status: Status,
        comment: &str,
        changed_at: Timestamp,
    ) -> Result<StatusChange, RepositoryError> {
        self.repository
            .append_status_change(id, status, comment, changed_at)
            .await
    }

    /// All rows, oldest first.
    pub async fn list(&self, id: AttendeeId) -> Result<Vec<StatusChange>, RepositoryError> {
        self.repository.list_status_changes(id).await
    }

    /// The newest row, if any.
    pub async fn latest_change(
        &self,
        id: AttendeeId,
    ) -> Result<Option<StatusChange>, RepositoryError> {
        Ok(self.list(id).await?.pop())
    }

    /// Current status.
    pub async fn latest(&self, id: AttendeeId) -> Result<Status, RepositoryError> {
        Ok(self
            .latest_change(id)
            .await?
            .map(|c| c.status)
            .unwrap_or_default())
    }
}
