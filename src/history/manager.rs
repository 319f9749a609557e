//! Branch-on-write undo/redo history
//!
//! The live snapshot lives in a `SessionContext` owned by the caller. The
//! history manager is the only thing allowed to change it: either by a
//! commit (merge a patch, append, advance) or by a restore (undo/redo).

use std::sync::Arc;

use tracing::debug;

use crate::project::{ProjectSnapshot, SnapshotPatch};

use super::log::HistoryLog;

/// Holds the live project snapshot for one editing session
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    snapshot: ProjectSnapshot,
}

impl SessionContext {
    pub fn new(snapshot: ProjectSnapshot) -> Self {
        Self { snapshot }
    }

    /// The current snapshot
    pub fn snapshot(&self) -> &ProjectSnapshot {
        &self.snapshot
    }

    fn replace(&mut self, snapshot: ProjectSnapshot) {
        self.snapshot = snapshot;
    }
}

/// Undo/redo manager over a bounded log of full snapshots
#[derive(Debug, Clone)]
pub struct HistoryManager {
    log: HistoryLog,
}

impl HistoryManager {
    /// Create a history with room for `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            log: HistoryLog::new(capacity),
        }
    }

    /// Merge `patch` into the current snapshot and record the result.
    ///
    /// Anything after the cursor is discarded; a stale future can never be
    /// redone once a new edit lands.
    pub fn commit<'a>(
        &mut self,
        ctx: &'a mut SessionContext,
        patch: SnapshotPatch,
    ) -> &'a ProjectSnapshot {
        let next = ctx.snapshot().merged(patch);
        let evicted = self.log.push(Arc::new(next.clone()));
        ctx.replace(next);

        debug!(
            cursor = ?self.log.cursor(),
            len = self.log.len(),
            evicted,
            "history commit"
        );
        ctx.snapshot()
    }

    /// Step back one entry and restore it. Returns `false` at the oldest entry.
    pub fn undo(&mut self, ctx: &mut SessionContext) -> bool {
        let Some(entry) = self.log.step_back() else {
            debug!("undo ignored: at oldest entry");
            return false;
        };
        ctx.replace(ProjectSnapshot::clone(entry));
        debug!(cursor = ?self.log.cursor(), len = self.log.len(), "undo");
        true
    }

    /// Step forward one entry and restore it. Returns `false` at the newest entry.
    pub fn redo(&mut self, ctx: &mut SessionContext) -> bool {
        let Some(entry) = self.log.step_forward() else {
            debug!("redo ignored: at newest entry");
            return false;
        };
        ctx.replace(ProjectSnapshot::clone(entry));
        debug!(cursor = ?self.log.cursor(), len = self.log.len(), "redo");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_step_back()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_step_forward()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.log.cursor()
    }

    pub fn capacity(&self) -> usize {
        self.log.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HISTORY_CAPACITY;
    use crate::project::Intensity;

    fn setup() -> (HistoryManager, SessionContext) {
        (
            HistoryManager::new(DEFAULT_HISTORY_CAPACITY),
            SessionContext::default(),
        )
    }

    fn intensity(value: i64) -> SnapshotPatch {
        SnapshotPatch::intensity(Intensity::new(value).unwrap())
    }

    #[test]
    fn test_undo_redo_scenario() {
        let (mut history, mut ctx) = setup();
        let initial_style = ctx.snapshot().selected_style_id.clone();

        history.commit(&mut ctx, intensity(40));
        history.commit(&mut ctx, SnapshotPatch::style("anime"));

        assert!(history.undo(&mut ctx));
        assert_eq!(ctx.snapshot().intensity.value(), 40);
        assert_eq!(ctx.snapshot().selected_style_id, initial_style);

        assert!(history.redo(&mut ctx));
        assert_eq!(ctx.snapshot().selected_style_id, "anime");
    }

    #[test]
    fn test_undo_then_redo_is_identity() {
        let (mut history, mut ctx) = setup();
        for value in [10, 20, 30, 40] {
            history.commit(&mut ctx, intensity(value));
        }
        history.commit(&mut ctx, SnapshotPatch::style("claymation"));

        let before = ctx.snapshot().clone();
        assert!(history.undo(&mut ctx));
        assert_ne!(ctx.snapshot(), &before);
        assert!(history.redo(&mut ctx));
        assert_eq!(ctx.snapshot(), &before);
    }

    #[test]
    fn test_commit_after_undo_branches() {
        let (mut history, mut ctx) = setup();
        history.commit(&mut ctx, intensity(10));
        history.commit(&mut ctx, intensity(20));
        history.commit(&mut ctx, intensity(30));

        history.undo(&mut ctx);
        history.undo(&mut ctx);
        history.commit(&mut ctx, intensity(99));

        assert!(!history.can_redo());
        assert!(!history.redo(&mut ctx));
        assert_eq!(ctx.snapshot().intensity.value(), 99);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_capacity_scenario() {
        let (mut history, mut ctx) = setup();
        for value in 1..=55 {
            history.commit(&mut ctx, intensity(value));
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.cursor(), Some(49));
        assert_eq!(ctx.snapshot().intensity.value(), 55);

        for _ in 0..49 {
            assert!(history.undo(&mut ctx));
        }
        // Earliest five commits were evicted
        assert_eq!(ctx.snapshot().intensity.value(), 6);
        assert!(!history.undo(&mut ctx));
        assert_eq!(ctx.snapshot().intensity.value(), 6);
    }

    #[test]
    fn test_noop_guards_on_empty_history() {
        let (mut history, mut ctx) = setup();
        let before = ctx.snapshot().clone();
        assert!(!history.undo(&mut ctx));
        assert!(!history.redo(&mut ctx));
        assert_eq!(ctx.snapshot(), &before);
        assert_eq!(history.cursor(), None);
    }

    #[test]
    fn test_single_entry_cannot_undo() {
        let (mut history, mut ctx) = setup();
        history.commit(&mut ctx, intensity(5));
        assert!(!history.can_undo());
        assert!(!history.undo(&mut ctx));
        assert_eq!(ctx.snapshot().intensity.value(), 5);
    }

    #[test]
    fn test_history_entries_are_not_mutated() {
        let (mut history, mut ctx) = setup();
        history.commit(&mut ctx, SnapshotPatch::style("anime"));
        history.commit(&mut ctx, SnapshotPatch::style("oil-painting"));
        history.undo(&mut ctx);
        history.commit(&mut ctx, SnapshotPatch::style("claymation"));
        history.undo(&mut ctx);
        assert_eq!(ctx.snapshot().selected_style_id, "anime");
    }
}
