//! Editing session
//!
//! Ties the live snapshot, its history and persistence together. Every
//! accepted mutation, whether a commit or a restore, is mirrored to storage
//! straight away.

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::{RestoreDirection, SessionEvent};
use crate::history::{HistoryManager, SessionContext};
use crate::persistence::PersistenceSync;
use crate::preview::{preview_transform, TransformDescriptor};
use crate::project::{EditAction, EditError, ProjectSnapshot, SnapshotPatch};

/// Undo/redo availability and position
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HistoryStatus {
    pub len: usize,
    pub cursor: Option<usize>,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// The single-threaded edit domain
pub struct Studio {
    context: SessionContext,
    history: HistoryManager,
    sync: PersistenceSync,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Studio {
    /// Rehydrate from storage and record the result as the history baseline
    pub fn open(
        sync: PersistenceSync,
        history_capacity: usize,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let mut context = SessionContext::new(sync.rehydrate());
        let mut history = HistoryManager::new(history_capacity);
        history.commit(&mut context, SnapshotPatch::default());

        info!(
            assets = context.snapshot().assets.len(),
            folders = context.snapshot().folders.len(),
            style = %context.snapshot().selected_style_id,
            "studio opened"
        );

        Self {
            context,
            history,
            sync,
            event_tx,
        }
    }

    pub fn snapshot(&self) -> &ProjectSnapshot {
        self.context.snapshot()
    }

    pub fn history_status(&self) -> HistoryStatus {
        HistoryStatus {
            len: self.history.len(),
            cursor: self.history.cursor(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    /// Validate and commit an edit action
    pub fn apply(&mut self, action: &EditAction) -> Result<&ProjectSnapshot, EditError> {
        let patch = action.to_patch(self.context.snapshot())?;
        let snapshot = self.history.commit(&mut self.context, patch);
        self.sync.persist(snapshot);

        debug!(action = action.label(), "edit applied");
        let _ = self.event_tx.send(SessionEvent::SnapshotCommitted {
            action: action.label().to_string(),
            history_len: self.history.len(),
            cursor: self.history.cursor().unwrap_or(0),
        });
        Ok(self.context.snapshot())
    }

    /// Restore the previous entry. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let restored = self.history.undo(&mut self.context);
        if restored {
            self.after_restore(RestoreDirection::Undo);
        }
        restored
    }

    /// Restore the next entry. Returns `false` if there is none.
    pub fn redo(&mut self) -> bool {
        let restored = self.history.redo(&mut self.context);
        if restored {
            self.after_restore(RestoreDirection::Redo);
        }
        restored
    }

    /// Preview of the current style and intensity
    pub fn preview(&self) -> TransformDescriptor {
        let snapshot = self.context.snapshot();
        preview_transform(&snapshot.selected_style_id, snapshot.intensity)
    }

    fn after_restore(&self, direction: RestoreDirection) {
        self.sync.persist(self.context.snapshot());
        let _ = self.event_tx.send(SessionEvent::HistoryRestored {
            direction,
            cursor: self.history.cursor().unwrap_or(0),
        });
    }
}
