// In-process keyed lock
// Serializes tasks of one process on a string id; entries are reference
// counted and dropped once no task holds or waits for the id

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::debug;

use quorum_lock_common::LocalLockError;

/// Holders and waiters of one id, sharing a single permit
struct Group {
    count: usize,
    permit: Arc<Semaphore>,
}

/// Map of exclusive locks keyed by id
#[derive(Default)]
pub struct KeyedLock {
    groups: Mutex<HashMap<String, Group>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `id` is exclusively held by the caller.
    ///
    /// The lock stays held until a matching `unlock(id)`; it is not tied to
    /// the calling task.
    pub async fn lock(&self, id: &str) -> Result<(), LocalLockError> {
        if id.is_empty() {
            return Err(LocalLockError::EmptyId);
        }

        let permit = {
            let mut groups = self.groups.lock();
            let group = groups.entry(id.to_string()).or_insert_with(|| Group {
                count: 0,
                permit: Arc::new(Semaphore::new(1)),
            });
            group.count += 1;
            Arc::clone(&group.permit)
        };

        // Undo the registration if this future is dropped while waiting
        let mut waiting = Waiting {
            lock: self,
            id,
            armed: true,
        };

        // The semaphore is never closed
        if let Ok(acquired) = permit.acquire().await {
            acquired.forget();
        }
        waiting.armed = false;

        Ok(())
    }

    /// Release `id` and drop its entry once no task holds or waits for it
    pub fn unlock(&self, id: &str) -> Result<(), LocalLockError> {
        if id.is_empty() {
            return Err(LocalLockError::EmptyId);
        }

        let mut groups = self.groups.lock();
        let Some(group) = groups.get_mut(id) else {
            debug!(key = %id, "Unlock of an id that is not locked");
            return Err(LocalLockError::NotFound(id.to_string()));
        };

        group.count = group.count.saturating_sub(1);
        let permit = Arc::clone(&group.permit);
        if group.count == 0 {
            groups.remove(id);
        }

        // At most one permit ever exists
        if permit.available_permits() == 0 {
            permit.add_permits(1);
        }
        Ok(())
    }

    /// Lock `id` and release it when the guard is dropped
    pub async fn lock_guard(&self, id: &str) -> Result<KeyedLockGuard<'_>, LocalLockError> {
        self.lock(id).await?;
        Ok(KeyedLockGuard {
            lock: self,
            id: id.to_string(),
        })
    }

    /// Whether some task holds or waits for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.groups.lock().contains_key(id)
    }

    /// Number of ids currently held or waited for
    pub fn len(&self) -> usize {
        self.groups.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.lock().is_empty()
    }

    fn abandon(&self, id: &str) {
        let mut groups = self.groups.lock();
        if let Some(group) = groups.get_mut(id) {
            group.count = group.count.saturating_sub(1);
            if group.count == 0 {
                groups.remove(id);
            }
        }
    }
}

struct Waiting<'a> {
    lock: &'a KeyedLock,
    id: &'a str,
    armed: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.lock.abandon(self.id);
        }
    }
}

/// Holds an id of a `KeyedLock` until dropped
pub struct KeyedLockGuard<'a> {
    lock: &'a KeyedLock,
    id: String,
}

impl KeyedLockGuard<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.lock.unlock(&self.id);
    }
}
