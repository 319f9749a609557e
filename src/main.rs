//! studio-daemon: background daemon for a single-user media studio
//!
//! The session engine owns the project snapshot, its history and the
//! dictation stream. The IPC server forwards client requests to it and
//! pushes session events to subscribers.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use studio_daemon::audio::{CaptureDevice, CaptureFormat};
use studio_daemon::config::Config;
use studio_daemon::engine::{EngineHandle, SessionEngine};
use studio_daemon::events::SessionEvent;
use studio_daemon::ipc::Server;
use studio_daemon::lifecycle::ShutdownSignal;
use studio_daemon::persistence::{FileStore, PersistenceSync};
use studio_daemon::stream::StreamSession;
use studio_daemon::studio::Studio;
use studio_daemon::transport::SocketConnector;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "studio-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        ?config.store_dir,
        transcriber = ?config.transcriber_addr,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::register()?;

    // Engine -> IPC subscribers
    let (event_tx, _) = broadcast::channel::<SessionEvent>(256);
    // IPC clients -> engine
    let (command_tx, command_rx) = mpsc::channel(64);

    let sync = PersistenceSync::new(Arc::new(FileStore::new(config.store_dir.clone())));
    let studio = Studio::open(sync, config.tunables.history_capacity, event_tx.clone());

    let dictation = StreamSession::new(
        capture_device(),
        Arc::new(SocketConnector::new(config.transcriber_addr)),
        CaptureFormat {
            sample_rate: config.tunables.sample_rate,
            frame_size: config.tunables.frame_size,
        },
        event_tx.clone(),
    );

    let engine = EngineHandle::new(command_tx);
    let mut engine_task = tokio::spawn(SessionEngine::new(studio, dictation).run(command_rx));

    let server = Server::bind(&config.socket_path, engine.clone(), event_tx)?;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = &mut engine_task => {
            error!("session engine exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;
    engine.shutdown().await;
    if !engine_task.is_finished() {
        let _ = engine_task.await;
    }

    info!("studio-daemon stopped");

    Ok(())
}

#[cfg(feature = "microphone")]
fn capture_device() -> Arc<dyn CaptureDevice> {
    Arc::new(studio_daemon::audio::MicrophoneDevice::new())
}

#[cfg(not(feature = "microphone"))]
fn capture_device() -> Arc<dyn CaptureDevice> {
    tracing::warn!("built without the microphone feature, dictation is unavailable");
    Arc::new(studio_daemon::audio::UnavailableDevice)
}
