//! Dictation stream states and the legal transitions between them

use serde::{Deserialize, Serialize};

/// Lifecycle state of the dictation stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Never started
    #[default]
    Idle,
    /// Acquiring the microphone and opening the channel
    Requesting,
    /// Channel handshake complete
    Connected,
    /// Frames are flowing
    Streaming,
    /// Stopped by the user or closed by the service
    Closed,
    /// Device or channel failure
    Errored,
}

impl StreamState {
    /// Whether the transition table allows moving to `next`
    pub fn can_transition_to(self, next: StreamState) -> bool {
        use StreamState::*;
        matches!(
            (self, next),
            (Idle | Closed | Errored, Requesting)
                | (Requesting, Connected)
                | (Connected, Streaming)
                | (Requesting | Connected | Streaming, Errored)
                | (Requesting | Connected | Streaming | Errored, Closed)
        )
    }

    /// Holding or about to hold the microphone
    pub fn is_active(self) -> bool {
        matches!(
            self,
            StreamState::Requesting | StreamState::Connected | StreamState::Streaming
        )
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Idle => write!(f, "Idle"),
            StreamState::Requesting => write!(f, "Requesting"),
            StreamState::Connected => write!(f, "Connected"),
            StreamState::Streaming => write!(f, "Streaming"),
            StreamState::Closed => write!(f, "Closed"),
            StreamState::Errored => write!(f, "Errored"),
        }
    }
}
