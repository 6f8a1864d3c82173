//! Per-attendee serialization.
//!
//! A status change reads the current status and ledger, decides, then
//! writes. Two such sequences for the same attendee must not interleave;
//! sequences for different attendees run in parallel.
//!
//! Slots exist only while someone holds or waits on them. The last guard
//! to drop removes its slot, so the table never outgrows the number of
//! attendees with a request in flight.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use attreg_core::AttendeeId;

type Slots = Arc<Mutex<HashMap<AttendeeId, Arc<AsyncMutex<()>>>>>;

/// One async mutex per attendee with a request in flight.
///
/// The outer `parking_lot` mutex guards only the map and is released
/// before awaiting the per-attendee lock.
#[derive(Debug, Default)]
pub struct AttendeeLocks {
    slots: Slots,
}

impl AttendeeLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn lock(&self, id: AttendeeId) -> AttendeeGuard {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(id).or_default())
        };
        let guard = slot.lock_owned().await;
        AttendeeGuard {
            id,
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of slots currently allocated.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slots are allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one attendee.
pub struct AttendeeGuard {
    id: AttendeeId,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl std::fmt::Debug for AttendeeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendeeGuard").field("id", &self.id).finish()
    }
}

impl Drop for AttendeeGuard {
    fn drop(&mut self) {
        // The map stays locked across release and removal, so no new
        // waiter can clone a slot in between. Slots left behind by waiters
        // that were cancelled mid-wait go in the same sweep.
        let mut slots = self.slots.lock();
        self.guard.take();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_attendee_is_serialized() {
        let locks = Arc::new(AttendeeLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let id = AttendeeId::new(1).unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_attendees_do_not_block() {
        let locks = AttendeeLocks::new();
        let _a = locks.lock(AttendeeId::new(1).unwrap()).await;
        let b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.lock(AttendeeId::new(2).unwrap()),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_slot_removed_when_last_guard_drops() {
        let locks = AttendeeLocks::new();
        let held = locks.lock(AttendeeId::new(1).unwrap()).await;
        drop(locks.lock(AttendeeId::new(2).unwrap()).await);
        assert_eq!(locks.len(), 1);
        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_slot_kept_while_someone_waits() {
        let locks = Arc::new(AttendeeLocks::new());
        let id = AttendeeId::new(1).unwrap();
        let held = locks.lock(id).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
            })
        };
        // Let the waiter register on the slot.
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_slot_is_swept() {
        let locks = AttendeeLocks::new();
        let id = AttendeeId::new(1).unwrap();
        let held = locks.lock(id).await;
        let gave_up = tokio::time::timeout(Duration::from_millis(5), locks.lock(id)).await;
        assert!(gave_up.is_err());
        drop(held);
        assert!(locks.is_empty());
    }
}
