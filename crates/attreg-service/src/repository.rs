//! # Attendee Repository
//!
//! Persistence contract for attendees, admin info, and the status history,
//! plus the in-memory implementation used by tests and the simulator.
//!
//! Status history rows are append-only. Appending a row also updates the
//! cached `status` on the attendee, under the same write lock, so the two
//! never disagree.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use attreg_core::{AttendeeId, Status, Subject, Timestamp};
use attreg_state::StatusChange;

use crate::attendee::{AdminInfo, Attendee, NewAttendee};

// -- Error --------------------------------------------------------------------

/// Errors from an [`AttendeeRepository`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No attendee with this id.
    #[error("attendee {0} not found")]
    NotFound(AttendeeId),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

// -- Trait --------------------------------------------------------------------

/// Persistence for attendees and their status history.
#[async_trait]
pub trait AttendeeRepository: Send + Sync {
    /// Store a new attendee with status `new` and assign its id.
    async fn add_attendee(
        &self,
        data: NewAttendee,
        owner: Subject,
        registered_at: Timestamp,
    ) -> Result<Attendee, RepositoryError>;

    /// Load an attendee.
    async fn get_attendee(&self, id: AttendeeId) -> Result<Attendee, RepositoryError>;

    /// Overwrite an attendee's registration data. The cached status is
    /// not taken from `attendee`; only status history appends change it.
    async fn update_attendee(&self, attendee: &Attendee) -> Result<(), RepositoryError>;

    /// All attendees registered by `owner`.
    async fn find_by_owner(&self, owner: &Subject) -> Result<Vec<Attendee>, RepositoryError>;

    /// An existing attendee with the same nickname and email, if any.
    async fn find_duplicate(
        &self,
        nickname: &str,
        email: &str,
    ) -> Result<Option<AttendeeId>, RepositoryError>;

    /// Admin info for an attendee; empty when none was written.
    async fn get_admin_info(&self, id: AttendeeId) -> Result<AdminInfo, RepositoryError>;

    /// Store admin info.
    async fn write_admin_info(&self, info: &AdminInfo) -> Result<(), RepositoryError>;

    /// Append a status history row and update the cached status.
    async fn append_status_change(
        &self,
        id: AttendeeId,
        status: Status,
        comment: &str,
        changed_at: Timestamp,
    ) -> Result<StatusChange, RepositoryError>;

    /// The attendee's history, oldest first.
    async fn list_status_changes(
        &self,
        id: AttendeeId,
    ) -> Result<Vec<StatusChange>, RepositoryError>;

    /// Human-readable name of this implementation.
    fn adapter_name(&self) -> &str;
}

// -- In-memory implementation --------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    attendees: BTreeMap<AttendeeId, Attendee>,
    admin_info: HashMap<AttendeeId, AdminInfo>,
    history: HashMap<AttendeeId, Vec<StatusChange>>,
    last_id: u64,
    fail_next_write: Option<String>,
}

impl Tables {
    fn take_failure(&mut self) -> Result<(), RepositoryError> {
        match self.fail_next_write.take() {
            Some(reason) => Err(RepositoryError::Storage(reason)),
            None => Ok(()),
        }
    }
}

/// Repository kept entirely in memory.
///
/// Cloning shares the underlying tables. The lock is `parking_lot` and is
/// never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write fail with a storage error.
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        self.tables.write().fail_next_write = Some(reason.into());
    }

    /// Number of stored attendees.
    pub fn len(&self) -> usize {
        self.tables.read().attendees.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttendeeRepository for InMemoryRepository {
    async fn add_attendee(
        &self,
        data: NewAttendee,
        owner: Subject,
        registered_at: Timestamp,
    ) -> Result<Attendee, RepositoryError> {
        let mut tables = self.tables.write();
        tables.take_failure()?;
        let id = AttendeeId::new(tables.last_id + 1)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        tables.last_id = id.get();
        let attendee = Attendee {
            id,
            owner,
            nickname: data.nickname,
            email: data.email,
            packages: data.packages,
            flags: data.flags,
            status: Status::New,
            registered_at,
        };
        tables.attendees.insert(id, attendee.clone());
        Ok(attendee)
    }

    async fn get_attendee(&self, id: AttendeeId) -> Result<Attendee, RepositoryError> {
        self.tables
            .read()
            .attendees
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update_attendee(&self, attendee: &Attendee) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.take_failure()?;
        let stored = tables
            .attendees
            .get_mut(&attendee.id)
            .ok_or(RepositoryError::NotFound(attendee.id))?;
        let status = stored.status;
        *stored = attendee.clone();
        stored.status = status;
        Ok(())
    }

    async fn find_by_owner(&self, owner: &Subject) -> Result<Vec<Attendee>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .attendees
            .values()
            .filter(|a| &a.owner == owner)
            .cloned()
            .collect())
    }

    async fn find_duplicate(
        &self,
        nickname: &str,
        email: &str,
    ) -> Result<Option<AttendeeId>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .attendees
            .values()
            .find(|a| a.nickname == nickname && a.email == email)
            .map(|a| a.id))
    }

    async fn get_admin_info(&self, id: AttendeeId) -> Result<AdminInfo, RepositoryError> {
        let tables = self.tables.read();
        if !tables.attendees.contains_key(&id) {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(tables
            .admin_info
            .get(&id)
            .cloned()
            .unwrap_or_else(|| AdminInfo::empty(id)))
    }

    async fn write_admin_info(&self, info: &AdminInfo) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.take_failure()?;
        if !tables.attendees.contains_key(&info.attendee_id) {
            return Err(RepositoryError::NotFound(info.attendee_id));
        }
        tables.admin_info.insert(info.attendee_id, info.clone());
        Ok(())
    }

    async fn append_status_change(
        &self,
        id: AttendeeId,
        status: Status,
        comment: &str,
        changed_at: Timestamp,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tables = self.tables.write();
        tables.take_failure()?;
        let attendee = tables
            .attendees
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        attendee.status = status;
        let rows = tables.history.entry(id).or_default();
        let change = StatusChange {
            sequence: rows.len() as u64,
            attendee_id: id,
            status,
            comment: comment.to_string(),
            changed_at,
        };
        rows.push(change.clone());
        Ok(change)
    }

    async fn list_status_changes(
        &self,
        id: AttendeeId,
    ) -> Result<Vec<StatusChange>, RepositoryError> {
        let tables = self.tables.read();
        if !tables.attendees.contains_key(&id) {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(tables.history.get(&id).cloned().unwrap_or_default())
    }

    fn adapter_name(&self) -> &str {
        "InMemoryRepository"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(s: &str) -> Subject {
        Subject::new(s).unwrap()
    }

    async fn seeded() -> (InMemoryRepository, Attendee) {
        let repo = InMemoryRepository::new();
        let attendee = repo
            .add_attendee(
                NewAttendee::new("Snep", "snep@example.com", ["attendance"]),
                subject("1234567890"),
                Timestamp::now(),
            )
            .await
            .unwrap();
        (repo, attendee)
    }

    #[tokio::test]
    async fn test_ids_are_sequential_from_one() {
        let (repo, first) = seeded().await;
        let second = repo
            .add_attendee(
                NewAttendee::new("Other", "other@example.com", ["attendance"]),
                subject("other"),
                Timestamp::now(),
            )
            .await
            .unwrap();
        assert_eq!(first.id.get(), 1);
        assert_eq!(second.id.get(), 2);
        assert_eq!(first.status, Status::New);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let repo = InMemoryRepository::new();
        let id = AttendeeId::new(77).unwrap();
        assert_eq!(
            repo.get_attendee(id).await.unwrap_err(),
            RepositoryError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_append_updates_cached_status_and_sequence() {
        let (repo, attendee) = seeded().await;
        let first = repo
            .append_status_change(attendee.id, Status::Approved, "ok", Timestamp::now())
            .await
            .unwrap();
        let second = repo
            .append_status_change(attendee.id, Status::Paid, "money", Timestamp::now())
            .await
            .unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);

        let stored = repo.get_attendee(attendee.id).await.unwrap();
        assert_eq!(stored.status, Status::Paid);
        let rows = repo.list_status_changes(attendee.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].comment, "money");
    }

    #[tokio::test]
    async fn test_update_does_not_touch_status() {
        let (repo, attendee) = seeded().await;
        repo.append_status_change(attendee.id, Status::Approved, "", Timestamp::now())
            .await
            .unwrap();
        let mut edited = attendee.clone();
        edited.nickname = "Renamed".into();
        edited.status = Status::Deleted;
        repo.update_attendee(&edited).await.unwrap();

        let stored = repo.get_attendee(attendee.id).await.unwrap();
        assert_eq!(stored.nickname, "Renamed");
        assert_eq!(stored.status, Status::Approved);
    }

    #[tokio::test]
    async fn test_admin_info_defaults_to_empty() {
        let (repo, attendee) = seeded().await;
        let info = repo.get_admin_info(attendee.id).await.unwrap();
        assert!(info.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_lookup() {
        let (repo, attendee) = seeded().await;
        assert_eq!(
            repo.find_duplicate("Snep", "snep@example.com").await.unwrap(),
            Some(attendee.id)
        );
        assert_eq!(
            repo.find_duplicate("Snep", "other@example.com").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_injected_write_failure_is_one_shot() {
        let (repo, attendee) = seeded().await;
        repo.fail_next_write("disk full");
        let err = repo
            .append_status_change(attendee.id, Status::Approved, "", Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err, RepositoryError::Storage("disk full".into()));
        assert!(repo.list_status_changes(attendee.id).await.unwrap().is_empty());

        repo.append_status_change(attendee.id, Status::Approved, "", Timestamp::now())
            .await
            .unwrap();
    }
}
