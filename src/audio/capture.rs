//! Capture device abstraction
//!
//! Acquiring a device and starting it are separate steps, the same way an
//! input stream is built before it is played: the session holds the device
//! while the transcription channel opens and only starts frames flowing once
//! the channel is ready.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::frame::AudioFrame;

/// Sender half the capture side pushes frames into
pub type FrameSender = mpsc::UnboundedSender<AudioFrame>;

/// Frame sender shared between a stream's data and error callbacks.
///
/// Closing the sink ends the frame stream; the session treats that as the
/// device failing.
#[derive(Debug, Clone)]
pub struct FrameSink {
    sender: Arc<Mutex<Option<FrameSender>>>,
}

impl FrameSink {
    pub fn new(frames: FrameSender) -> Self {
        Self {
            sender: Arc::new(Mutex::new(Some(frames))),
        }
    }

    /// Deliver a frame. Returns `false` once the sink is closed or the
    /// receiver is gone.
    pub fn send(&self, frame: AudioFrame) -> bool {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Drop the sender so the receiving side sees the stream end
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }
}

/// Requested capture format (always mono)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub frame_size: usize,
}

/// Errors that can occur acquiring or running a capture device
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("microphone is already in use")]
    Busy,

    #[error("no capture device available: {0}")]
    Unavailable(String),

    #[error("capture stream failed: {0}")]
    Stream(String),
}

/// A source of audio that can be exclusively acquired
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device. No frames are produced until the handle is started.
    fn acquire(&self, format: CaptureFormat) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// Exclusive hold on an acquired device
///
/// Dropping a handle must release the device as `stop` does.
pub trait CaptureHandle: Send {
    /// Begin delivering frames, in capture order, into `frames`
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError>;

    /// Stop producing frames and release the device.
    ///
    /// Returns only once no further frame can be sent. Safe to call twice.
    fn stop(&mut self);
}

/// Device that always fails to acquire, for builds without microphone support
#[derive(Debug, Default)]
pub struct UnavailableDevice;

impl CaptureDevice for UnavailableDevice {
    fn acquire(&self, _format: CaptureFormat) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        Err(CaptureError::Unavailable(
            "built without microphone support".to_string(),
        ))
    }
}

/// Counters shared between a synthetic device and its handles
#[derive(Debug, Default)]
struct SyntheticShared {
    held: AtomicBool,
    acquisitions: AtomicU64,
    frames_emitted: AtomicU64,
}

/// Scripted frame source standing in for a microphone
///
/// Emits the configured frames in order once started, then stays silent but
/// held until stopped, like a muted microphone.
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    frames: Arc<Vec<Vec<f32>>>,
    interval: Option<Duration>,
    deny: bool,
    fail_after_frames: bool,
    shared: Arc<SyntheticShared>,
}

impl SyntheticDevice {
    /// Source that emits `frames` back to back
    pub fn new(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames: Arc::new(frames),
            interval: None,
            deny: false,
            fail_after_frames: false,
            shared: Arc::new(SyntheticShared::default()),
        }
    }

    /// Source whose acquisition is always refused
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(Vec::new())
        }
    }

    /// Wait `interval` before each frame
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// End the frame stream after the scripted frames, the way a stream
    /// error does, while still holding the device until stopped
    pub fn with_stream_failure(mut self) -> Self {
        self.fail_after_frames = true;
        self
    }

    /// Whether a handle currently holds the device
    pub fn is_held(&self) -> bool {
        self.shared.held.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> u64 {
        self.shared.acquisitions.load(Ordering::SeqCst)
    }

    pub fn frames_emitted(&self) -> u64 {
        self.shared.frames_emitted.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for SyntheticDevice {
    fn acquire(&self, format: CaptureFormat) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        if self.deny {
            return Err(CaptureError::PermissionDenied);
        }
        if self.shared.held.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Busy);
        }
        self.shared.acquisitions.fetch_add(1, Ordering::SeqCst);
        debug!(?format, "synthetic device acquired");

        Ok(Box::new(SyntheticHandle {
            device: self.clone(),
            worker: None,
            stop_tx: None,
            released: false,
        }))
    }
}

struct SyntheticHandle {
    device: SyntheticDevice,
    worker: Option<JoinHandle<()>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    released: bool,
}

impl CaptureHandle for SyntheticHandle {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        if self.released || self.worker.is_some() {
            return Err(CaptureError::Stream("handle already used".to_string()));
        }

        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let source = Arc::clone(&self.device.frames);
        let interval = self.device.interval;
        let shared = Arc::clone(&self.device.shared);
        let fail_after_frames = self.device.fail_after_frames;
        let sink = FrameSink::new(frames);

        let worker = thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || {
                for (sequence, samples) in source.iter().enumerate() {
                    if let Some(interval) = interval {
                        match stop_rx.recv_timeout(interval) {
                            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                            _ => return,
                        }
                    } else if stop_rx.try_recv().is_ok() {
                        return;
                    }

                    let frame = AudioFrame::new(sequence as u64, samples.clone());
                    if !sink.send(frame) {
                        return;
                    }
                    shared.frames_emitted.fetch_add(1, Ordering::SeqCst);
                }
                if fail_after_frames {
                    debug!("synthetic stream failing");
                    sink.close();
                }
                // Hold the device until stopped
                let _ = stop_rx.recv();
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        self.worker = Some(worker);
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    fn stop(&mut self) {
        if self.released {
            return;
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.released = true;
        self.device.shared.held.store(false, Ordering::SeqCst);
        info!("synthetic device released");
    }
}

impl Drop for SyntheticHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
