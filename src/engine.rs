//! Session engine
//!
//! One task owns the studio, the dictation session and the draft. Requests
//! from any number of IPC clients are queued on an mpsc channel and handled
//! one at a time, each answered through its own oneshot.

use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::ipc::{error_codes, DaemonStatus, Request, Response};
use crate::preview::{catalog, preview_transform};
use crate::project::Intensity;
use crate::stream::{StreamError, StreamSession};
use crate::studio::Studio;
use crate::transcript::DraftInput;

/// Commands accepted by the engine task
pub enum EngineCommand {
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable handle for talking to the engine task
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(tx: mpsc::Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    /// Send a request and wait for its response
    pub async fn request(&self, request: Request) -> Response {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(EngineCommand::Request { request, reply })
            .await
            .is_err()
        {
            return Response::error(error_codes::ENGINE_UNAVAILABLE, "engine stopped");
        }
        rx.await.unwrap_or_else(|_| {
            Response::error(error_codes::ENGINE_UNAVAILABLE, "engine dropped the request")
        })
    }

    /// Stop dictation and end the engine task
    pub async fn shutdown(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(EngineCommand::Shutdown { done }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Owner of all session state
pub struct SessionEngine {
    studio: Studio,
    dictation: StreamSession,
    draft: DraftInput,
    started_at: Instant,
}

impl SessionEngine {
    pub fn new(studio: Studio, dictation: StreamSession) -> Self {
        Self {
            studio,
            dictation,
            draft: DraftInput::new(),
            started_at: Instant::now(),
        }
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self, mut commands: mpsc::Receiver<EngineCommand>) {
        info!("session engine running");

        while let Some(command) = commands.recv().await {
            match command {
                EngineCommand::Request { request, reply } => {
                    let response = self.handle(request).await;
                    if reply.send(response).is_err() {
                        debug!("requester went away before the response");
                    }
                }
                EngineCommand::Shutdown { done } => {
                    self.shutdown().await;
                    let _ = done.send(());
                    return;
                }
            }
        }

        self.shutdown().await;
    }

    /// Handle a single request
    pub async fn handle(&mut self, request: Request) -> Response {
        debug!(?request, "handling request");

        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => Response::Status(DaemonStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                dictation: self.dictation.state(),
                history: self.studio.history_status(),
                uptime_secs: self.started_at.elapsed().as_secs(),
            }),

            Request::GetSnapshot => self.snapshot_response(true),

            Request::Edit { action } => match self.studio.apply(&action) {
                Ok(_) => self.snapshot_response(true),
                Err(e) => {
                    debug!(action = action.label(), error = %e, "edit rejected");
                    Response::error(error_codes::INVALID_EDIT, e.to_string())
                }
            },

            Request::Undo => {
                let changed = self.studio.undo();
                self.snapshot_response(changed)
            }

            Request::Redo => {
                let changed = self.studio.redo();
                self.snapshot_response(changed)
            }

            Request::Preview {
                style_id,
                intensity,
            } => {
                let snapshot = self.studio.snapshot();
                let intensity = match intensity {
                    Some(value) => match Intensity::new(value) {
                        Some(intensity) => intensity,
                        None => {
                            return Response::error(
                                error_codes::BAD_REQUEST,
                                format!("intensity {value} is outside 0..=100"),
                            )
                        }
                    },
                    None => snapshot.intensity,
                };
                let style_id = style_id.as_deref().unwrap_or(&snapshot.selected_style_id);
                let transform = preview_transform(style_id, intensity);
                Response::Preview {
                    css_filter: transform.to_css_filter(),
                    transform,
                }
            }

            Request::ListStyles => Response::Styles { styles: catalog() },

            Request::StartDictation => {
                let result = self.dictation.start().await;
                self.dictation_response(result, 0)
            }

            Request::StopDictation => {
                let result = self.dictation.stop().await;
                self.dictation_response(result, 0)
            }

            Request::ToggleDictation => {
                let result = self.dictation.toggle().await.map(|_| ());
                self.dictation_response(result, 0)
            }

            Request::ReadDictation { since } => self.dictation_response(Ok(()), since),

            Request::AppendDraft { text } => {
                self.draft.absorb(&self.dictation.pending_text());
                self.draft.push_str(&text);
                Response::Draft {
                    text: Some(self.draft.text().to_string()),
                }
            }

            Request::SubmitDraft => {
                self.draft.absorb(&self.dictation.pending_text());
                let text = self.draft.submit();
                if let Some(text) = &text {
                    info!(len = text.len(), "draft submitted");
                }
                Response::Draft { text }
            }

            // Notification delivery is the server's concern
            Request::Subscribe => Response::Subscribed,
        }
    }

    /// Stop any active dictation so the microphone is released
    pub async fn shutdown(&mut self) {
        if self.dictation.state().is_active() {
            if let Err(e) = self.dictation.stop().await {
                warn!(error = %e, "failed to stop dictation on shutdown");
            }
        }
        info!("session engine stopped");
    }

    fn snapshot_response(&self, changed: bool) -> Response {
        Response::Snapshot {
            snapshot: self.studio.snapshot().clone(),
            history: self.studio.history_status(),
            changed,
        }
    }

    fn dictation_response(&self, result: Result<(), StreamError>, since: usize) -> Response {
        if let Err(e) = result {
            let code = match &e {
                StreamError::InvalidTransition { .. } => error_codes::INVALID_TRANSITION,
                StreamError::DeviceAcquisition(_) => error_codes::DEVICE_UNAVAILABLE,
            };
            return Response::error(code, e.to_string());
        }

        match self.dictation.pending_text().read_from(since) {
            Some((text, next_offset)) => Response::Dictation {
                state: self.dictation.state(),
                text,
                next_offset,
            },
            None => Response::error(
                error_codes::BAD_REQUEST,
                format!("offset {since} is not a valid dictation offset"),
            ),
        }
    }
}
