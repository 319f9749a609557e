//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::SessionEvent;
use crate::preview::{StyleInfo, TransformDescriptor};
use crate::project::{EditAction, ProjectSnapshot};
use crate::studio::HistoryStatus;
use crate::stream::StreamState;

/// Requests from a client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Current project snapshot and history position
    GetSnapshot,

    /// Apply an edit action as a history commit
    Edit { action: EditAction },

    Undo,

    Redo,

    /// Preview transform; missing fields use the current snapshot
    Preview {
        #[serde(default)]
        style_id: Option<String>,
        #[serde(default)]
        intensity: Option<i64>,
    },

    /// Available styles
    ListStyles,

    StartDictation,

    StopDictation,

    /// Stop an active dictation, otherwise start one
    ToggleDictation,

    /// Dictated text appended since byte offset `since`
    ReadDictation {
        #[serde(default)]
        since: usize,
    },

    /// Append typed text to the draft
    AppendDraft { text: String },

    /// Take the draft with any new dictation merged in
    SubmitDraft,

    /// Subscribe to session event notifications
    Subscribe,
}

/// Responses from the daemon to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Snapshot after a read, edit, undo or redo
    Snapshot {
        snapshot: ProjectSnapshot,
        history: HistoryStatus,
        /// False when an undo/redo had nothing to restore
        changed: bool,
    },

    Preview {
        transform: TransformDescriptor,
        css_filter: String,
    },

    Styles { styles: Vec<StyleInfo> },

    /// Dictation state and text since the requested offset
    Dictation {
        state: StreamState,
        text: String,
        next_offset: usize,
    },

    /// Draft text after an append, or the submitted draft.
    /// `None` if a submitted draft was blank.
    Draft { text: Option<String> },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A session event occurred
    Event { event: SessionEvent },
    /// Events were dropped because the client fell behind
    Lagged { skipped: u64 },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Dictation stream state
    pub dictation: StreamState,

    pub history: HistoryStatus,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

/// Error codes carried in `Response::Error`
pub mod error_codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const INVALID_EDIT: &str = "invalid_edit";
    pub const INVALID_TRANSITION: &str = "invalid_transition";
    pub const DEVICE_UNAVAILABLE: &str = "device_unavailable";
    pub const ENGINE_UNAVAILABLE: &str = "engine_unavailable";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::Edit {
            action: EditAction::SetIntensity { value: 40 },
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""type":"edit""#));
        assert!(json.contains(r#""action":"set_intensity""#));
    }

    #[test]
    fn test_request_defaults() {
        let req: Request = serde_json::from_str(r#"{"type":"preview"}"#).unwrap();
        assert_eq!(
            req,
            Request::Preview {
                style_id: None,
                intensity: None
            }
        );
        let req: Request = serde_json::from_str(r#"{"type":"read_dictation"}"#).unwrap();
        assert_eq!(req, Request::ReadDictation { since: 0 });
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::error(error_codes::INVALID_EDIT, "no asset with id 9");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("invalid_edit"));
    }
}
