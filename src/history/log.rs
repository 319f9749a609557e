//! Bounded history log
//!
//! A ring buffer of immutable snapshots plus a cursor marking the current
//! entry. Evicting the oldest entry is a pop from the front of the ring, so
//! the window slides without shifting the remaining entries.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::project::ProjectSnapshot;

/// An immutable point in the undo/redo log
pub type HistoryEntry = Arc<ProjectSnapshot>;

/// Sliding window of the most recent committed snapshots
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    /// Index of the current entry, `None` while the log is empty
    cursor: Option<usize>,
    capacity: usize,
}

impl HistoryLog {
    /// Create an empty log holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: None,
            capacity,
        }
    }

    /// Append after the cursor, dropping any entries beyond it.
    ///
    /// Returns `true` if the oldest entry was evicted to stay within capacity.
    pub fn push(&mut self, entry: HistoryEntry) -> bool {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push_back(entry);

        let evicted = self.entries.len() > self.capacity;
        if evicted {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
        evicted
    }

    /// Move the cursor one entry back, returning the new current entry
    pub fn step_back(&mut self) -> Option<&HistoryEntry> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.entries.get(c - 1)
            }
            _ => None,
        }
    }

    /// Move the cursor one entry forward, returning the new current entry
    pub fn step_forward(&mut self) -> Option<&HistoryEntry> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                self.entries.get(c + 1)
            }
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_step_back(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_step_forward(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Intensity, SnapshotPatch};

    fn entry(intensity: i64) -> HistoryEntry {
        let patch = SnapshotPatch::intensity(Intensity::new(intensity).unwrap());
        Arc::new(ProjectSnapshot::default().merged(patch))
    }

    fn intensity_at_cursor(log: &HistoryLog) -> u8 {
        log.current().unwrap().intensity.value()
    }

    #[test]
    fn test_empty_log() {
        let mut log = HistoryLog::new(3);
        assert!(log.is_empty());
        assert_eq!(log.cursor(), None);
        assert!(log.step_back().is_none());
        assert!(log.step_forward().is_none());
    }

    #[test]
    fn test_push_truncates_future() {
        let mut log = HistoryLog::new(10);
        log.push(entry(1));
        log.push(entry(2));
        log.push(entry(3));
        log.step_back();
        log.step_back();
        assert_eq!(intensity_at_cursor(&log), 1);

        log.push(entry(9));
        assert_eq!(log.len(), 2);
        assert_eq!(log.cursor(), Some(1));
        assert!(!log.can_step_forward());
    }

    #[test]
    fn test_eviction_slides_window() {
        let mut log = HistoryLog::new(3);
        for i in 1..=3 {
            assert!(!log.push(entry(i)));
        }
        assert!(log.push(entry(4)));
        assert_eq!(log.len(), 3);
        assert_eq!(log.cursor(), Some(2));
        let retained: Vec<u8> = log.iter().map(|e| e.intensity.value()).collect();
        assert_eq!(retained, vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut log = HistoryLog::new(0);
        log.push(entry(1));
        log.push(entry(2));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(intensity_at_cursor(&log), 2);
    }
}
