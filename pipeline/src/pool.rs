//! Free list of reusable records
//!
//! Records are boxed so checking one out or in moves a pointer, not the record. The free
//! list is a fixed size lock-free queue: `acquire` falls back to an allocation when it is
//! empty, `release` drops the record when it is full. The number of records checked out at
//! any time is therefore unbounded, only the number kept around for reuse is.
//!
//! Releasing the same record twice is impossible since `release` takes ownership of the
//! box. Releasing a record that did not come from this pool is allowed, it just joins the
//! free list.
use crate::record::Record;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

pub type PooledRecord = Box<Record>;

pub struct RecordPool {
    free: ArrayQueue<PooledRecord>,
    hits: AtomicU64,
    misses: AtomicU64,
    returns: AtomicU64,
    drops: AtomicU64,
}

/// Point-in-time snapshot of the pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub drops: u64,
}

impl PoolStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            1.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl RecordPool {
    /// `retain` is the maximum number of idle records kept for reuse
    pub fn new(retain: usize) -> Self {
        Self {
            free: ArrayQueue::new(retain.max(1)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    /// Inserts up to `count` ready records, returns how many were added.
    pub fn prewarm(&self, count: usize) -> usize {
        let mut added = 0;
        for _ in 0..count {
            if self.free.push(Box::new(Record::new())).is_err() {
                break;
            }
            added += 1;
        }
        added
    }

    pub fn acquire(&self) -> PooledRecord {
        match self.free.pop() {
            Some(mut record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                record.reset();
                record
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Box::new(Record::new())
            }
        }
    }

    pub fn release(&self, mut record: PooledRecord) {
        record.reset();
        if self.free.push(record).is_ok() {
            self.returns.fetch_add(1, Ordering::Relaxed);
        } else {
            // free list is full, let it go
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn idle(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.free.capacity()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;
    use std::sync::Arc;

    #[test]
    fn test_acquire_from_prewarmed_pool() {
        let pool = RecordPool::new(8);
        assert_eq!(pool.prewarm(4), 4);
        assert_eq!(pool.idle(), 4);

        let record = pool.acquire();
        assert!(record.is_empty());
        assert_eq!(pool.idle(), 3);
        assert_eq!(pool.stats().hits, 1);
        assert_eq!(pool.stats().misses, 0);
    }

    #[test]
    fn test_acquire_when_empty_allocates() {
        let pool = RecordPool::new(2);
        let record = pool.acquire();
        assert!(record.is_empty());
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn test_release_resets_record() {
        let pool = RecordPool::new(2);
        let mut record = pool.acquire();
        record
            .with_level(Level::Error)
            .with_field("k", "v")
            .with_error("boom");
        pool.release(record);
        assert_eq!(pool.idle(), 1);

        let record = pool.acquire();
        assert!(record.is_empty());
        assert!(!record.is_published());
    }

    #[test]
    fn test_prewarm_and_release_respect_retention() {
        let pool = RecordPool::new(2);
        assert_eq!(pool.prewarm(5), 2);
        pool.release(Box::new(Record::new()));
        let stats = pool.stats();
        assert_eq!(stats.returns, 0);
        assert_eq!(stats.drops, 1);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Arc::new(RecordPool::new(64));
        pool.prewarm(16);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for n in 0..1000 {
                        let mut record = pool.acquire();
                        assert!(record.is_empty());
                        record.with_field("thread", i).with_field("n", n);
                        pool.release(record);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.hits + stats.misses, 8000);
        assert_eq!(stats.returns + stats.drops, 8000);
        assert!(pool.idle() <= pool.capacity());
    }
}
