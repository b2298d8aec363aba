use crate::canvas::Snapshot;
use crate::error::PaintError;

// ============================================================================
// HISTORY LOG - linear snapshot history with a cursor
// ============================================================================

/// Linear undo/redo history of whole-canvas snapshots.
///
/// `entries[cursor]` is the state currently on screen. Undo and redo only move
/// the cursor; entries are never changed after they are committed. Committing
/// while the cursor is behind the newest entry discards the redo segment.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<Snapshot>,
    cursor: Option<usize>,
    /// 0 = unbounded.
    max_entries: usize,
    /// Running byte total across all entries.
    total_memory: usize,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_entries` snapshots, evicting the oldest first.
    pub fn with_capacity_limit(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn commit(&mut self, snapshot: Snapshot) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        for dropped in self.entries.drain(keep..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_bytes());
        }

        self.total_memory += snapshot.memory_bytes();
        self.entries.push(snapshot);
        self.cursor = Some(self.entries.len() - 1);

        self.prune();
    }

    fn prune(&mut self) {
        if self.max_entries == 0 {
            return;
        }
        while self.entries.len() > self.max_entries {
            let removed = self.entries.remove(0);
            self.total_memory = self.total_memory.saturating_sub(removed.memory_bytes());
            self.cursor = self.cursor.and_then(|c| c.checked_sub(1));
        }
    }

    /// Step back one entry and hand it out for rendering.
    pub fn undo(&mut self) -> Result<Snapshot, PaintError> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                Ok(self.entries[c - 1].clone())
            }
            _ => Err(PaintError::NothingToUndo),
        }
    }

    pub fn redo(&mut self) -> Result<Snapshot, PaintError> {
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => {
                self.cursor = Some(c + 1);
                Ok(self.entries[c + 1].clone())
            }
            _ => Err(PaintError::NothingToRedo),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo_count() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.redo_count() > 0
    }

    /// Number of undo steps available.
    pub fn undo_count(&self) -> usize {
        self.cursor.unwrap_or(0)
    }

    pub fn redo_count(&self) -> usize {
        match self.cursor {
            Some(c) => self.entries.len() - c - 1,
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the displayed entry.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.map(|c| &self.entries[c])
    }

    /// Bytes held by all entries (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.total_memory = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelBuffer;
    use image::Rgba;

    /// Distinct 2×2 snapshots, told apart by the color of pixel (0, 0).
    fn snap(tag: u8) -> Snapshot {
        let mut buf = PixelBuffer::new(2, 2);
        buf.set(0, 0, Rgba([tag, 0, 0, 255])).unwrap();
        buf.snapshot()
    }

    fn tag(s: &Snapshot) -> u8 {
        s.get_pixel(0, 0).map_or(0, |p| p[0])
    }

    #[test]
    fn empty_log_has_nothing_either_way() {
        let mut log = HistoryLog::new();
        assert!(matches!(log.undo(), Err(PaintError::NothingToUndo)));
        assert!(matches!(log.redo(), Err(PaintError::NothingToRedo)));
        assert!(log.current().is_none());
    }

    #[test]
    fn single_baseline_cannot_be_undone() {
        let mut log = HistoryLog::new();
        log.commit(snap(1));
        assert!(!log.can_undo());
        assert!(matches!(log.undo(), Err(PaintError::NothingToUndo)));
        assert_eq!(log.cursor(), Some(0));
    }

    #[test]
    fn abcd_scenario() {
        let mut log = HistoryLog::new();
        log.commit(snap(b'A'));
        log.commit(snap(b'B'));
        log.commit(snap(b'C'));

        log.undo().unwrap();
        assert_eq!(tag(&log.undo().unwrap()), b'A');
        assert_eq!(log.cursor(), Some(0));

        assert_eq!(tag(&log.redo().unwrap()), b'B');
        log.commit(snap(b'D'));
        assert!(matches!(log.redo(), Err(PaintError::NothingToRedo)));
        assert_eq!(log.len(), 3);
        assert_eq!(tag(log.current().unwrap()), b'D');
    }

    #[test]
    fn commit_after_any_number_of_undos_kills_redo() {
        for undos in 0..5 {
            let mut log = HistoryLog::new();
            for t in 0..5 {
                log.commit(snap(t));
            }
            for _ in 0..undos {
                log.undo().unwrap();
            }
            log.commit(snap(99));
            assert!(!log.can_redo());
            assert!(matches!(log.redo(), Err(PaintError::NothingToRedo)));
            assert_eq!(log.len(), 5 - undos + 1);
        }
    }

    #[test]
    fn undo_then_redo_returns_the_same_entry() {
        let mut log = HistoryLog::new();
        for t in 0..4 {
            log.commit(snap(t));
        }
        log.undo().unwrap();
        let before = log.current().cloned().unwrap();
        log.undo().unwrap();
        let again = log.redo().unwrap();
        assert!(again.same_entry(&before));
    }

    #[test]
    fn capacity_limit_evicts_oldest() {
        let mut log = HistoryLog::with_capacity_limit(3);
        for t in 0..5 {
            log.commit(snap(t));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.cursor(), Some(2));
        assert_eq!(log.undo_count(), 2);
        log.undo().unwrap();
        assert_eq!(tag(&log.undo().unwrap()), 2);
        assert!(log.undo().is_err());
    }

    #[test]
    fn memory_usage_tracks_truncation() {
        let mut log = HistoryLog::new();
        let per_entry = snap(0).memory_bytes();
        for t in 0..3 {
            log.commit(snap(t));
        }
        assert_eq!(log.memory_usage(), per_entry * 3);
        log.undo().unwrap();
        log.undo().unwrap();
        log.commit(snap(7));
        assert_eq!(log.memory_usage(), per_entry * 2);
        log.clear();
        assert_eq!(log.memory_usage(), 0);
        assert!(log.is_empty());
    }
}
