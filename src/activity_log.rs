//! Bounded, thread-safe activity log.
//!
//! The orchestrator appends human-readable progress lines here while the API
//! reads recent snapshots. Once the capacity is reached the oldest entry is
//! dropped. Nothing is persisted across restarts.

use crate::models::LogEntry;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock_entries(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message stamped with the current local time.
    pub fn push(&self, message: impl Into<String>) {
        let entry = LogEntry::now(message);
        info!(target: "activity", "{}", entry.message);
        self.record(entry);
    }

    pub fn record(&self, entry: LogEntry) {
        let mut entries = self.lock_entries();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.lock_entries();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// The most recent `n` entries rendered as `[HH:MM:SS] message`.
    pub fn recent_lines(&self, n: usize) -> Vec<String> {
        self.recent(n).iter().map(ToString::to_string).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}
