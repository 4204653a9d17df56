//! Keyed asynchronous locks.
//!
//! The session record stores serialize their conditional writes through
//! these: one mutex per (assessment, user) key makes the active-uniqueness
//! check and the insert a single critical section without blocking
//! unrelated pairs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

/// A map of independently lockable keys.
///
/// Entries are created on first use. `evict_idle` drops entries that have
/// been unused past a deadline and are no longer referenced by any task.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, LockEntry>,
}

#[derive(Debug, Clone)]
struct LockEntry {
    lock: Arc<Mutex<()>>,
    last_used: Instant,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Lock handle for `key`, creating one on first use.
    pub fn get(&self, key: &str) -> Arc<Mutex<()>> {
        let mut entry = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| LockEntry {
                lock: Arc::new(Mutex::new(())),
                last_used: Instant::now(),
            });
        entry.last_used = Instant::now();
        entry.lock.clone()
    }

    /// Drop entries idle longer than `max_idle`.
    ///
    /// An entry still referenced outside this map (a task holds or awaits
    /// the lock) is never dropped, whatever its age. Returns the number of
    /// entries removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut evicted = 0;
        self.locks.retain(|_, entry| {
            let stale =
                entry.last_used.elapsed() > max_idle && Arc::strong_count(&entry.lock) == 1;
            if stale {
                evicted += 1;
            }
            !stale
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Composite lock key for an (assessment, user) pair.
///
/// NUL-joined so distinct pairs can never collide on concatenation.
pub fn pair_key(assessment_id: &str, user_id: &str) -> String {
    format!("{}\0{}", assessment_id, user_id)
}

// ============================================================================
// Tests
// ============================================================================
