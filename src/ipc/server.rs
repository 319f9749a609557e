//! Unix domain socket server for IPC
//!
//! Provides request-response communication with the session engine and push
//! notifications of session events to subscribed clients.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::EngineHandle;
use crate::events::SessionEvent;
use crate::framing::{read_frame, write_frame, FramingError};

use super::protocol::{error_codes, Notification, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    engine: EngineHandle,
    events: broadcast::Sender<SessionEvent>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the socket, replacing a stale one
    pub fn bind(
        socket_path: &Path,
        engine: EngineHandle,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            engine,
            events,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let client = Client {
                        engine: self.engine.clone(),
                        events: self.events.clone(),
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = client.serve(stream) => {
                                if let Err(e) = result {
                                    warn!(error = %e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Disconnect clients and remove the socket file
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Per-connection state
struct Client {
    engine: EngineHandle,
    events: broadcast::Sender<SessionEvent>,
}

/// What the reader task passes on
enum Incoming {
    Request(Request),
    Malformed(String),
}

/// Aborts the reader task when the connection handler ends
struct ReaderTask(JoinHandle<()>);

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Client {
    async fn serve(self, stream: UnixStream) -> Result<(), FramingError> {
        let (reader, mut writer) = stream.into_split();
        let (incoming_tx, mut incoming_rx) = mpsc::channel(8);
        let _reader = ReaderTask(tokio::spawn(read_requests(reader, incoming_tx)));
        let mut subscription: Option<broadcast::Receiver<SessionEvent>> = None;

        loop {
            tokio::select! {
                incoming = incoming_rx.recv() => {
                    let request = match incoming {
                        Some(Incoming::Request(request)) => request,
                        Some(Incoming::Malformed(message)) => {
                            let response = Response::error(error_codes::BAD_REQUEST, message);
                            write_frame(&mut writer, &response).await?;
                            continue;
                        }
                        None => return Ok(()),
                    };

                    debug!(?request, "received request");
                    if request == Request::Subscribe && subscription.is_none() {
                        subscription = Some(self.events.subscribe());
                        debug!("client subscribed to notifications");
                    }

                    let response = self.engine.request(request).await;
                    write_frame(&mut writer, &response).await?;
                }

                notification = next_notification(&mut subscription) => {
                    match notification {
                        Some(notification) => write_frame(&mut writer, &notification).await?,
                        None => subscription = None,
                    }
                }
            }
        }
    }
}

/// Read framed requests until the client disconnects
async fn read_requests(mut reader: OwnedReadHalf, incoming: mpsc::Sender<Incoming>) {
    loop {
        let next = match read_frame::<_, Request>(&mut reader).await {
            Ok(Some(request)) => Incoming::Request(request),
            Ok(None) => {
                debug!("client disconnected");
                return;
            }
            Err(FramingError::Json(e)) => {
                warn!(error = %e, "malformed request");
                Incoming::Malformed(e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "dropping client");
                return;
            }
        };
        if incoming.send(next).await.is_err() {
            return;
        }
    }
}

/// Wait for the next event on the subscription, if any.
///
/// Returns `None` once the event channel is closed. Never resolves when the
/// client is not subscribed.
async fn next_notification(
    subscription: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Option<Notification> {
    let Some(rx) = subscription else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(event) => Some(Notification::Event { event }),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(skipped, "subscriber lagged");
            Some(Notification::Lagged { skipped })
        }
        Err(broadcast::error::RecvError::Closed) => None,
    }
}
