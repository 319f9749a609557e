//! TCP link to a transcription relay
//!
//! Messages travel as length-prefixed JSON in both directions. A writer task
//! drains the outbound queue onto the socket and a reader task feeds the
//! inbound queue; neither retries. A transport failure surfaces as an
//! inbound `error` and ends the channel.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::framing::{read_frame, write_frame};

use super::protocol::{
    ChannelError, InboundMessage, OutboundMessage, TranscriptionChannel, TranscriptionConnector,
};

/// Connector dialing a relay over TCP
#[derive(Debug, Clone)]
pub struct SocketConnector {
    addr: Option<SocketAddr>,
}

impl SocketConnector {
    /// `None` yields a connector that always reports `NotConfigured`
    pub fn new(addr: Option<SocketAddr>) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl TranscriptionConnector for SocketConnector {
    async fn connect(&self) -> Result<TranscriptionChannel, ChannelError> {
        let addr = self.addr.ok_or(ChannelError::NotConfigured)?;
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!(%addr, "connected to transcription relay");

        let (mut reader, mut writer) = stream.into_split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundMessage>();

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &msg).await {
                    warn!(error = %e, "relay write failed");
                    return;
                }
            }
            debug!("outbound queue closed, relay writer exiting");
        });

        tokio::spawn(async move {
            loop {
                match read_frame::<_, InboundMessage>(&mut reader).await {
                    Ok(Some(msg)) => {
                        if inbound_tx.send(msg).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        let _ = inbound_tx.send(InboundMessage::Closed);
                        return;
                    }
                    Err(e) => {
                        let _ = inbound_tx.send(InboundMessage::Error {
                            message: e.to_string(),
                        });
                        return;
                    }
                }
            }
        });

        Ok(TranscriptionChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
