//! Per-username serialization point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per username. Different users never contend.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, username: &str) -> Arc<Mutex<()>> {
        // Nothing but `()` sits behind these locks, so poisoning is harmless.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(username.to_string()).or_default())
    }

    /// Runs `f` while holding `username`'s lock. The entry is dropped again
    /// once no other caller holds or waits for it.
    pub fn with_lock<T>(&self, username: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(username);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(username, &lock);
        result
    }

    fn release(&self, username: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under the map lock, so the count is exact:
        // one for the map and one for `lock`.
        let idle = locks
            .get(username)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(username);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_user_is_serialized() {
        let locks = Arc::new(UserLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks.with_lock("alice", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_users_get_different_locks() {
        let locks = UserLocks::new();
        let a = locks.lock_for("alice");
        let b = locks.lock_for("bob");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &locks.lock_for("alice")));
    }

    #[test]
    fn test_entries_released_after_use() {
        let locks = UserLocks::new();
        locks.with_lock("alice", || ());
        locks.with_lock("..", || ());
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_entry_kept_while_another_caller_holds_it() {
        let locks = UserLocks::new();
        let held = locks.lock_for("alice");
        locks.with_lock("alice", || ());
        assert_eq!(locks.len(), 1);
        assert!(Arc::ptr_eq(&held, &locks.lock_for("alice")));
    }

    #[test]
    fn test_returns_closure_value() {
        let locks = UserLocks::new();
        assert_eq!(locks.with_lock("alice", || 42), 42);
    }
}
