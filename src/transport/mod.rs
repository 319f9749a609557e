//! Transcription service transports

mod memory;
mod protocol;
mod socket;

pub use memory::{Handshake, MemoryConnector, MemoryPeer};
pub use protocol::{
    pcm_mime_type, ChannelError, InboundMessage, OutboundMessage, TranscriptionChannel,
    TranscriptionConnector,
};
pub use socket::SocketConnector;
