use std::sync::Arc;

use dashmap::DashMap;
use futures::lock::{Mutex, OwnedMutexGuard};

/// One async mutex per user id, created on first use.
///
/// Serializes check-then-insert sequences that no unique key can guard,
/// such as the leave overlap check. Scope is this process only. Entries are
/// kept for the life of the process, so the map holds at most one lock per user.
#[derive(Default)]
pub struct UserLocks {
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: u64) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(user_id).or_default().clone();
        lock.lock_owned().await
    }
}
