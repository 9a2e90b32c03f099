//! Per-name mutual exclusion
//!
//! Lock identity follows the *value* of the name. Slots are created lazily
//! in a sharded table and removed by the last guard that leaves, so the
//! table never holds more slots than there are callers currently holding
//! or waiting for a name.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

type Table = HashMap<String, Arc<Slot>>;

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

impl Slot {
    fn acquire(&self) {
        let mut held = lock(&self.held);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    fn release(&self) {
        *lock(&self.held) = false;
        self.released.notify_one();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Table of per-name locks
#[derive(Debug)]
pub struct NameLocks {
    shards: Box<[Mutex<Table>]>,
    hasher: RandomState,
}

impl NameLocks {
    /// Create a table with `shards` shards (at least one)
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(Table::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Block until `name` is free, then hold it until the guard drops
    pub fn lock(&self, name: &str) -> NameGuard<'_> {
        let slot = {
            let mut table = lock(self.shard(name));
            Arc::clone(table.entry(name.to_string()).or_default())
        };
        slot.acquire();
        NameGuard {
            locks: self,
            name: name.to_string(),
            slot: Some(slot),
        }
    }

    /// Run `body` while holding `name`
    pub fn with_lock<R>(&self, name: &str, body: impl FnOnce() -> R) -> R {
        let _guard = self.lock(name);
        body()
    }

    /// Number of names currently held or waited on
    pub fn active(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, name: &str) -> &Mutex<Table> {
        let index = self.hasher.hash_one(name) as usize % self.shards.len();
        &self.shards[index]
    }

    fn release(&self, name: &str, slot: Arc<Slot>) {
        slot.release();
        // clones are only taken and dropped under the shard lock
        let mut table = lock(self.shard(name));
        drop(slot);
        let unused = table
            .get(name)
            .is_some_and(|current| Arc::strong_count(current) == 1);
        if unused {
            table.remove(name);
        }
    }
}

impl Default for NameLocks {
    fn default() -> Self {
        Self::new(16)
    }
}

/// Exclusive hold on one name; released on drop (including unwinding)
#[derive(Debug)]
pub struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
    slot: Option<Arc<Slot>>,
}

impl NameGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.locks.release(&self.name, slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_equal_values_share_a_lock() {
        let locks = Arc::new(NameLocks::new(4));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // a distinct String instance per thread
                    let name = String::from("same") + "";
                    barrier.wait();
                    locks.with_lock(&name, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_different_names_do_not_block() {
        let locks = Arc::new(NameLocks::new(1));
        let held = locks.lock("a");

        let (tx, rx) = mpsc::channel();
        let other = Arc::clone(&locks);
        let handle = thread::spawn(move || {
            other.with_lock("b", || tx.send(()).unwrap());
        });

        rx.recv_timeout(Duration::from_secs(5))
            .expect("lock on 'b' blocked behind 'a'");
        handle.join().unwrap();
        assert_eq!(held.name(), "a");
        drop(held);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_table_is_bounded_by_active_names() {
        let locks = NameLocks::new(8);
        for i in 0..1000 {
            locks.with_lock(&format!("script-{}", i), || {});
        }
        assert_eq!(locks.active(), 0);

        let a = locks.lock("a");
        let b = locks.lock("b");
        assert_eq!(locks.active(), 2);
        drop(a);
        drop(b);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_contended_releases_leave_no_slots() {
        let locks = Arc::new(NameLocks::new(2));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for round in 0..500 {
                        let name = format!("n{}", round % 3);
                        locks.with_lock(&name, || {});
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_panic_releases_lock() {
        let locks = Arc::new(NameLocks::default());
        let cloned = Arc::clone(&locks);
        let result = thread::spawn(move || {
            cloned.with_lock("p", || panic!("boom"));
        })
        .join();
        assert!(result.is_err());

        // would deadlock if the panic left the name held
        locks.with_lock("p", || {});
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn test_zero_shards_clamped() {
        assert_eq!(NameLocks::new(0).shard_count(), 1);
    }
}
