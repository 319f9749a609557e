//! Transcription stream message definitions
//!
//! Outbound the session only ever sends audio chunks. Inbound the service
//! sends transcript fragments and lifecycle signals.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Messages sent to the transcription service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    AudioChunk {
        #[serde(rename = "mimeTypeHint")]
        mime_type_hint: String,
        /// Base64 little-endian PCM16
        payload: String,
    },
}

impl OutboundMessage {
    pub fn audio_chunk(sample_rate: u32, payload: String) -> Self {
        Self::AudioChunk {
            mime_type_hint: pcm_mime_type(sample_rate),
            payload,
        }
    }
}

/// Messages received from the transcription service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Handshake complete, audio may flow
    Opened,
    /// Incremental transcript text
    TranscriptFragment { text: String },
    /// The service reported a failure
    Error { message: String },
    /// The service closed the session
    Closed,
}

/// Mime type hint for raw PCM16 at `sample_rate`
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// The two unidirectional queues of an open transcription channel
#[derive(Debug)]
pub struct TranscriptionChannel {
    pub outbound: mpsc::UnboundedSender<OutboundMessage>,
    pub inbound: mpsc::UnboundedReceiver<InboundMessage>,
}

/// Errors opening or using a transcription channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("no transcription endpoint configured")]
    NotConfigured,

    #[error("failed to connect: {0}")]
    Connect(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("transcription service error: {0}")]
    Remote(String),

    #[error("transcription channel closed")]
    Closed,
}

/// Opens channels to a transcription service
#[async_trait]
pub trait TranscriptionConnector: Send + Sync {
    /// Open a new channel. The first inbound message completes the handshake.
    async fn connect(&self) -> Result<TranscriptionChannel, ChannelError>;
}
