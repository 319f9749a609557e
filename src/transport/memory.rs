//! In-process transcription channel
//!
//! Each `connect` hands the service side of the new channel to whoever holds
//! the peer receiver, so tests and embedders can play the remote service.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::protocol::{
    ChannelError, InboundMessage, OutboundMessage, TranscriptionChannel, TranscriptionConnector,
};

/// How the simulated service answers a new connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Send `opened` immediately
    Accept,
    /// Send an `error` with this message instead of `opened`
    Reject(String),
    /// Send nothing; the peer decides
    Manual,
}

/// Service side of one in-memory channel
#[derive(Debug)]
pub struct MemoryPeer {
    /// Audio chunks sent by the session, in order
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    /// Inject fragments and lifecycle signals
    pub inbound: mpsc::UnboundedSender<InboundMessage>,
}

/// Connector producing in-memory channels
#[derive(Debug)]
pub struct MemoryConnector {
    handshake: Handshake,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Create a connector and the receiver of each connection's peer
    pub fn new(handshake: Handshake) -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        (Self { handshake, peers }, peer_rx)
    }
}

#[async_trait]
impl TranscriptionConnector for MemoryConnector {
    async fn connect(&self) -> Result<TranscriptionChannel, ChannelError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        match &self.handshake {
            Handshake::Accept => {
                let _ = inbound_tx.send(InboundMessage::Opened);
            }
            Handshake::Reject(message) => {
                let _ = inbound_tx.send(InboundMessage::Error {
                    message: message.clone(),
                });
            }
            Handshake::Manual => {}
        }

        self.peers
            .send(MemoryPeer {
                outbound: outbound_rx,
                inbound: inbound_tx,
            })
            .map_err(|_| ChannelError::Closed)?;
        debug!(handshake = ?self.handshake, "in-memory channel opened");

        Ok(TranscriptionChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
