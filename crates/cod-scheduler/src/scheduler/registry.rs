//! In-flight registry
//!
//! Maps a key to the single execution currently running for it plus the
//! waiters queued on that execution. Entries exist only while an execution
//! is pending: inserted on first arrival, removed on completion. When
//! nothing is in flight the map is empty.
//!
//! The only mutators are [`Registry::join_or_create`] and
//! [`Registry::drain`]. Both run under the map's per-shard lock, which makes
//! "look up, else create and become the executor" atomic per key.

use super::continuation::Continuation;
use cod_response::ExecutionId;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    execution: ExecutionId,
    waiters: Vec<Continuation>,
    started: Instant,
}

/// Result of an admission attempt
#[derive(Debug)]
pub(crate) enum Slot {
    /// Appended to a pending entry at `position` (0 is the executor)
    Joined {
        execution: ExecutionId,
        position: usize,
    },
    /// New entry created; the caller must start the execution
    Created { execution: ExecutionId },
}

/// Admission refused by the in-flight limit
#[derive(Debug)]
pub(crate) struct Rejected {
    pub(crate) limit: usize,
}

/// Key → pending execution map
#[derive(Debug)]
pub(crate) struct Registry<K: Hash + Eq> {
    entries: DashMap<K, Entry>,
    in_flight: AtomicUsize,
}

impl<K: Hash + Eq + Clone> Registry<K> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Join the pending execution for `key`, or create one
    pub(crate) fn join_or_create(
        &self,
        key: K,
        waiter: Continuation,
        limit: Option<usize>,
    ) -> Result<Slot, Rejected> {
        match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.waiters.push(waiter);
                Ok(Slot::Joined {
                    execution: entry.execution,
                    position: entry.waiters.len() - 1,
                })
            }
            MapEntry::Vacant(vacant) => {
                self.reserve(limit)?;
                let execution = ExecutionId::new();
                vacant.insert(Entry {
                    execution,
                    waiters: vec![waiter],
                    started: Instant::now(),
                });
                Ok(Slot::Created { execution })
            }
        }
    }

    fn reserve(&self, limit: Option<usize>) -> Result<(), Rejected> {
        match limit {
            Some(limit) => self
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
                .map(|_| ())
                .map_err(|_| Rejected { limit }),
            None => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Remove the entry for `key` owned by `execution`, returning its
    /// waiters in arrival order
    pub(crate) fn drain(&self, key: &K, execution: ExecutionId) -> Vec<Continuation> {
        match self.entries.remove_if(key, |_, entry| entry.execution == execution) {
            Some((_, entry)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                tracing::trace!(
                    %execution,
                    waiters = entry.waiters.len(),
                    elapsed_ms = saturating_millis(entry.started.elapsed()),
                    "entry drained"
                );
                entry.waiters
            }
            None => Vec::new(),
        }
    }

    /// Number of pending executions
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of waiters queued on `key`, if it is pending
    pub(crate) fn waiter_count(&self, key: &K) -> Option<usize> {
        self.entries.get(key).map(|entry| entry.waiters.len())
    }
}

fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
