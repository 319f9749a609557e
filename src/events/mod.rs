//! Events module for session changes
//!
//! Structured events for history commits and restores and for the
//! dictation stream lifecycle. Broadcast to subscribed IPC clients.

use serde::{Deserialize, Serialize};

/// Which way a history restore moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreDirection {
    Undo,
    Redo,
}

/// Events emitted by the session engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An edit was committed to the history
    SnapshotCommitted {
        action: String,
        history_len: usize,
        cursor: usize,
    },

    /// An undo or redo restored a history entry
    HistoryRestored {
        direction: RestoreDirection,
        cursor: usize,
    },

    /// Microphone and channel are being acquired
    DictationRequested,

    /// Audio is flowing to the transcription service
    DictationStreaming,

    /// The dictation session closed
    DictationClosed,

    /// The dictation session failed
    DictationErrored {
        reason: String,
    },

    /// A transcript fragment was appended to the pending text
    TranscriptFragment {
        text: String,
    },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::SnapshotCommitted { action, cursor, .. } => {
                write!(f, "SNAPSHOT_COMMITTED ({action} @{cursor})")
            }
            SessionEvent::HistoryRestored { direction, cursor } => {
                write!(f, "HISTORY_RESTORED ({direction:?} @{cursor})")
            }
            SessionEvent::DictationRequested => write!(f, "DICTATION_REQUESTED"),
            SessionEvent::DictationStreaming => write!(f, "DICTATION_STREAMING"),
            SessionEvent::DictationClosed => write!(f, "DICTATION_CLOSED"),
            SessionEvent::DictationErrored { reason } => {
                write!(f, "DICTATION_ERRORED ({reason})")
            }
            SessionEvent::TranscriptFragment { text } => {
                write!(f, "TRANSCRIPT_FRAGMENT ({} chars)", text.chars().count())
            }
        }
    }
}
