//! Dictation streaming session
//!
//! Drives one microphone-to-transcriber session at a time:
//!
//! ```text
//! Idle -> Requesting -> Connected -> Streaming -> Closed
//!              \             \            \
//!               +-------------+------------+--> Errored
//! ```
//!
//! `start` acquires the device and hands it to a stream task, then returns
//! with the session `Requesting`. The task opens the channel, waits for the
//! handshake, starts capture and pumps: it forwards frames in capture order
//! and appends inbound fragments to the pending text. Every stage listens
//! for the stop signal. `stop` signals the task and waits for it, so the
//! device is released before `stop` returns whatever stage the task was in.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{AudioFrame, CaptureDevice, CaptureError, CaptureFormat, CaptureHandle};
use crate::events::SessionEvent;
use crate::transcript::TranscriptBuffer;
use crate::transport::{
    ChannelError, InboundMessage, OutboundMessage, TranscriptionChannel, TranscriptionConnector,
};

use super::state::StreamState;

/// Errors returned by session operations.
///
/// Channel failures happen on the stream task after `start` has returned;
/// they move the session to `Errored` and are reported as
/// `SessionEvent::DictationErrored`.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("cannot move dictation stream from {from} to {to}")]
    InvalidTransition { from: StreamState, to: StreamState },

    #[error("microphone unavailable: {0}")]
    DeviceAcquisition(#[from] CaptureError),
}

/// State shared with the stream task
#[derive(Debug, Default)]
struct Shared {
    state: Mutex<StreamState>,
    pending: TranscriptBuffer,
}

impl Shared {
    fn state(&self) -> StreamState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a transition from the table, returning the previous state
    fn transition(&self, next: StreamState) -> Result<StreamState, StreamError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let from = *state;
        if !from.can_transition_to(next) {
            return Err(StreamError::InvalidTransition { from, to: next });
        }
        *state = next;
        info!(from = %from, to = %next, "dictation stream transition");
        Ok(from)
    }
}

/// A running stream task and its stop signal
struct ActiveStream {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// How the pump loop ended
enum PumpExit {
    Stopped,
    RemoteClosed,
    Failed(String),
}

/// The dictation streaming session
pub struct StreamSession {
    device: Arc<dyn CaptureDevice>,
    connector: Arc<dyn TranscriptionConnector>,
    format: CaptureFormat,
    shared: Arc<Shared>,
    event_tx: broadcast::Sender<SessionEvent>,
    active: Option<ActiveStream>,
}

impl StreamSession {
    /// Create an idle session
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        connector: Arc<dyn TranscriptionConnector>,
        format: CaptureFormat,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            device,
            connector,
            format,
            shared: Arc::new(Shared::default()),
            event_tx,
            active: None,
        }
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Handle on the pending dictated text
    pub fn pending_text(&self) -> TranscriptBuffer {
        self.shared.pending.clone()
    }

    /// Start a new session.
    ///
    /// An active session is stopped first, so the microphone is never held
    /// twice. Returns once the device is held and the session is
    /// `Requesting`; the channel opens in the background. If the device
    /// cannot be acquired the session is left `Errored` with the pending
    /// text untouched.
    pub async fn start(&mut self) -> Result<(), StreamError> {
        if self.state().is_active() {
            info!("dictation already active, restarting");
            self.stop().await?;
        }

        self.shared.transition(StreamState::Requesting)?;
        emit(&self.event_tx, SessionEvent::DictationRequested);

        let device = Arc::clone(&self.device);
        let format = self.format;
        let acquired = tokio::task::spawn_blocking(move || device.acquire(format))
            .await
            .unwrap_or_else(|e| Err(CaptureError::Stream(format!("acquire task failed: {e}"))));
        let capture = match acquired {
            Ok(capture) => capture,
            Err(e) => {
                fail(&self.shared, &self.event_tx, e.to_string());
                return Err(e.into());
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_stream(
            StreamTask {
                shared: Arc::clone(&self.shared),
                event_tx: self.event_tx.clone(),
                connector: Arc::clone(&self.connector),
                sample_rate: self.format.sample_rate,
            },
            capture,
            stop_rx,
        ));
        self.active = Some(ActiveStream { stop_tx, task });
        Ok(())
    }

    /// Stop the session and release the microphone.
    ///
    /// Legal from every state but `Idle`, including while the channel is
    /// still opening. Stopping a closed session does nothing.
    pub async fn stop(&mut self) -> Result<(), StreamError> {
        if let Some(active) = self.active.take() {
            let _ = active.stop_tx.send(());
            if let Err(e) = active.task.await {
                warn!(?e, "dictation stream task failed");
            }
        }

        match self.state() {
            StreamState::Closed => {
                debug!("dictation already closed");
                Ok(())
            }
            StreamState::Idle => Err(StreamError::InvalidTransition {
                from: StreamState::Idle,
                to: StreamState::Closed,
            }),
            _ => {
                self.shared.transition(StreamState::Closed)?;
                emit(&self.event_tx, SessionEvent::DictationClosed);
                Ok(())
            }
        }
    }

    /// Stop an active session, otherwise start one
    pub async fn toggle(&mut self) -> Result<StreamState, StreamError> {
        if self.state().is_active() {
            self.stop().await?;
        } else {
            self.start().await?;
        }
        Ok(self.state())
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.stop_tx.send(());
        }
    }
}

fn emit(event_tx: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    debug!(%event, "emitting session event");
    let _ = event_tx.send(event);
}

fn fail(shared: &Shared, event_tx: &broadcast::Sender<SessionEvent>, reason: String) {
    warn!(reason = %reason, "dictation failed");
    if shared.transition(StreamState::Errored).is_ok() {
        emit(event_tx, SessionEvent::DictationErrored { reason });
    }
}

/// Everything the stream task needs besides the device and stop signal
struct StreamTask {
    shared: Arc<Shared>,
    event_tx: broadcast::Sender<SessionEvent>,
    connector: Arc<dyn TranscriptionConnector>,
    sample_rate: u32,
}

/// Open the channel, start capture, then pump until stopped or failed
async fn run_stream(
    task: StreamTask,
    capture: Box<dyn CaptureHandle>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let opened = tokio::select! {
        biased;

        // Resolves on an explicit stop or when the session is dropped
        _ = &mut stop_rx => {
            debug!("stopped before the channel opened");
            release(capture).await;
            return;
        }

        opened = open_channel(task.connector.as_ref()) => opened,
    };

    let TranscriptionChannel { outbound, inbound } = match opened {
        Ok(channel) => channel,
        Err(e) => {
            release(capture).await;
            fail(&task.shared, &task.event_tx, e.to_string());
            return;
        }
    };
    if task.shared.transition(StreamState::Connected).is_err() {
        release(capture).await;
        return;
    }

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let capture = match start_capture(capture, frame_tx).await {
        Ok(capture) => capture,
        Err(e) => {
            fail(&task.shared, &task.event_tx, e.to_string());
            return;
        }
    };

    // A stop that arrived while capture was starting wins
    if !matches!(stop_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
        debug!("stopped while connected");
        release(capture).await;
        return;
    }

    if task.shared.transition(StreamState::Streaming).is_err() {
        release(capture).await;
        return;
    }
    emit(&task.event_tx, SessionEvent::DictationStreaming);

    pump(task, capture, frame_rx, outbound, inbound, stop_rx).await;
}

/// Connect and wait for the service to signal `opened`
async fn open_channel(
    connector: &dyn TranscriptionConnector,
) -> Result<TranscriptionChannel, ChannelError> {
    let mut channel = connector.connect().await?;
    match channel.inbound.recv().await {
        Some(InboundMessage::Opened) => Ok(channel),
        Some(InboundMessage::Error { message }) => Err(ChannelError::Handshake(message)),
        Some(other) => Err(ChannelError::Handshake(format!(
            "unexpected {other:?} before opened"
        ))),
        None => Err(ChannelError::Closed),
    }
}

/// Start capture on the blocking pool; device startup may wait on the OS.
///
/// A handle that fails to start is released before the error is returned.
async fn start_capture(
    capture: Box<dyn CaptureHandle>,
    frames: mpsc::UnboundedSender<AudioFrame>,
) -> Result<Box<dyn CaptureHandle>, CaptureError> {
    tokio::task::spawn_blocking(move || {
        let mut capture = capture;
        match capture.start(frames) {
            Ok(()) => Ok(capture),
            Err(e) => {
                capture.stop();
                Err(e)
            }
        }
    })
    .await
    .unwrap_or_else(|e| Err(CaptureError::Stream(format!("capture start task failed: {e}"))))
}

/// Stop capture on the blocking pool; returns once the device is released
async fn release(mut capture: Box<dyn CaptureHandle>) {
    let stopped = tokio::task::spawn_blocking(move || capture.stop()).await;
    if let Err(e) = stopped {
        warn!(?e, "capture release task failed");
    }
}

/// Forward frames and merge fragments until stopped or failed
async fn pump(
    task: StreamTask,
    capture: Box<dyn CaptureHandle>,
    mut frames: mpsc::UnboundedReceiver<AudioFrame>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let StreamTask {
        shared,
        event_tx,
        sample_rate,
        ..
    } = task;
    let mut sent: u64 = 0;
    let forward = |frame: AudioFrame| -> bool {
        if shared.state() != StreamState::Streaming {
            return true;
        }
        let chunk = OutboundMessage::audio_chunk(sample_rate, frame.encode_base64());
        outbound.send(chunk).is_ok()
    };

    let exit = loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => break PumpExit::Stopped,

            message = inbound.recv() => match message {
                Some(InboundMessage::TranscriptFragment { text }) => {
                    shared.pending.append(&text);
                    let _ = event_tx.send(SessionEvent::TranscriptFragment { text });
                }
                Some(InboundMessage::Error { message }) => break PumpExit::Failed(message),
                Some(InboundMessage::Closed) | None => break PumpExit::RemoteClosed,
                Some(InboundMessage::Opened) => debug!("ignoring repeated opened signal"),
            },

            frame = frames.recv() => match frame {
                Some(frame) => {
                    if !forward(frame) {
                        break PumpExit::Failed(ChannelError::Closed.to_string());
                    }
                    sent += 1;
                }
                None => break PumpExit::Failed("capture device stopped delivering frames".to_string()),
            },
        }
    };

    // Nothing else happens until the device has stopped producing frames
    release(capture).await;

    match exit {
        PumpExit::Stopped => {
            // Frames captured before the stop still go out, in order
            while let Ok(frame) = frames.try_recv() {
                if !forward(frame) {
                    break;
                }
                sent += 1;
            }
            info!(frames = sent, "dictation stream stopped");
        }
        PumpExit::RemoteClosed => {
            info!(frames = sent, "transcription service closed the stream");
            if shared.transition(StreamState::Closed).is_ok() {
                let _ = event_tx.send(SessionEvent::DictationClosed);
            }
        }
        PumpExit::Failed(reason) => {
            warn!(frames = sent, reason = %reason, "dictation stream failed");
            if shared.transition(StreamState::Errored).is_ok() {
                let _ = event_tx.send(SessionEvent::DictationErrored { reason });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use crate::audio::{decode_pcm16_base64, quantize, SyntheticDevice};
    use crate::transport::{Handshake, MemoryConnector, MemoryPeer};

    const FRAME: usize = 8;

    fn format() -> CaptureFormat {
        CaptureFormat {
            sample_rate: 16_000,
            frame_size: FRAME,
        }
    }

    fn frames(count: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|i| vec![i as f32 / 100.0; FRAME])
            .collect()
    }

    struct Harness {
        session: StreamSession,
        device: SyntheticDevice,
        peers: mpsc::UnboundedReceiver<MemoryPeer>,
        events: broadcast::Receiver<SessionEvent>,
    }

    fn harness(device: SyntheticDevice, handshake: Handshake) -> Harness {
        let (connector, peers) = MemoryConnector::new(handshake);
        let (event_tx, events) = broadcast::channel(256);
        let session = StreamSession::new(
            Arc::new(device.clone()),
            Arc::new(connector),
            format(),
            event_tx,
        );
        Harness {
            session,
            device,
            peers,
            events,
        }
    }

    async fn next_chunk(peer: &mut MemoryPeer) -> Vec<i16> {
        let msg = tokio::time::timeout(Duration::from_secs(5), peer.outbound.recv())
            .await
            .expect("timed out waiting for audio chunk")
            .expect("outbound closed");
        let OutboundMessage::AudioChunk {
            mime_type_hint,
            payload,
        } = msg;
        assert_eq!(mime_type_hint, "audio/pcm;rate=16000");
        decode_pcm16_base64(&payload).unwrap()
    }

    async fn wait_for_state(session: &StreamSession, state: StreamState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.state() != state {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("state not reached");
    }

    fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Device whose first start blocks until the gate opens
    struct GatedDevice {
        inner: SyntheticDevice,
        gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    struct GatedHandle {
        inner: Box<dyn CaptureHandle>,
        gate: Option<std::sync::mpsc::Receiver<()>>,
    }

    impl CaptureDevice for GatedDevice {
        fn acquire(&self, format: CaptureFormat) -> Result<Box<dyn CaptureHandle>, CaptureError> {
            let inner = self.inner.acquire(format)?;
            let gate = self.gate.lock().unwrap().take();
            Ok(Box::new(GatedHandle { inner, gate }))
        }
    }

    impl CaptureHandle for GatedHandle {
        fn start(&mut self, frames: mpsc::UnboundedSender<AudioFrame>) -> Result<(), CaptureError> {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
            self.inner.start(frames)
        }

        fn stop(&mut self) {
            self.inner.stop();
        }
    }

    #[tokio::test]
    async fn test_frames_forwarded_in_capture_order() {
        let mut h = harness(SyntheticDevice::new(frames(20)), Handshake::Accept);
        assert_ok!(h.session.start().await);
        wait_for_state(&h.session, StreamState::Streaming).await;

        let mut peer = h.peers.recv().await.unwrap();
        for i in 0..20 {
            let pcm = next_chunk(&mut peer).await;
            assert_eq!(pcm.len(), FRAME);
            assert_eq!(pcm[0], quantize(i as f32 / 100.0));
        }

        assert_ok!(h.session.stop().await);
        assert_eq!(h.session.state(), StreamState::Closed);
        assert!(!h.device.is_held());
        // Channel closed with no trailing frames
        assert!(peer.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fragments_merge_in_arrival_order() {
        let mut h = harness(SyntheticDevice::new(Vec::new()), Handshake::Accept);
        h.session.start().await.unwrap();
        let peer = h.peers.recv().await.unwrap();

        for text in ["add ", "a ", "a ", "folder"] {
            peer.inbound
                .send(InboundMessage::TranscriptFragment {
                    text: text.to_string(),
                })
                .unwrap();
        }
        let pending = h.session.pending_text();
        tokio::time::timeout(Duration::from_secs(5), async {
            while pending.text() != "add a a folder" {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fragments not merged");

        h.session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_device_denied() {
        let mut h = harness(SyntheticDevice::denied(), Handshake::Accept);
        let err = assert_err!(h.session.start().await);
        assert!(matches!(err, StreamError::DeviceAcquisition(CaptureError::PermissionDenied)));
        assert_eq!(h.session.state(), StreamState::Errored);
        assert!(h.session.pending_text().is_empty());
        // No channel was ever opened
        assert!(h.peers.try_recv().is_err());

        let events = drain(&mut h.events);
        assert!(matches!(events.last(), Some(SessionEvent::DictationErrored { .. })));
    }

    #[tokio::test]
    async fn test_handshake_rejected_releases_device() {
        let mut h = harness(
            SyntheticDevice::new(frames(3)),
            Handshake::Reject("quota exceeded".to_string()),
        );
        assert_ok!(h.session.start().await);
        wait_for_state(&h.session, StreamState::Errored).await;
        assert!(!h.device.is_held());
        assert_eq!(h.device.frames_emitted(), 0);

        let events = drain(&mut h.events);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::DictationErrored { reason }) if reason.contains("quota exceeded")
        ));
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_pending_text() {
        let device = SyntheticDevice::new(frames(1000)).with_interval(Duration::from_millis(2));
        let mut h = harness(device, Handshake::Accept);
        h.session.start().await.unwrap();
        let peer = h.peers.recv().await.unwrap();

        peer.inbound
            .send(InboundMessage::TranscriptFragment {
                text: "keep me".to_string(),
            })
            .unwrap();
        peer.inbound
            .send(InboundMessage::Error {
                message: "socket reset".to_string(),
            })
            .unwrap();

        wait_for_state(&h.session, StreamState::Errored).await;
        assert!(!h.device.is_held());
        assert_eq!(h.session.pending_text().text(), "keep me");

        // Stop after an error closes without complaint
        assert_ok!(h.session.stop().await);
        assert_eq!(h.session.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut h = harness(SyntheticDevice::new(frames(2)), Handshake::Accept);
        h.session.start().await.unwrap();
        assert_ok!(h.session.stop().await);
        assert_ok!(h.session.stop().await);

        let closed = drain(&mut h.events)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::DictationClosed))
            .count();
        assert_eq!(closed, 1);
    }

    #[tokio::test]
    async fn test_stop_from_idle_is_invalid() {
        let mut h = harness(SyntheticDevice::new(Vec::new()), Handshake::Accept);
        let err = assert_err!(h.session.stop().await);
        assert!(matches!(err, StreamError::InvalidTransition { .. }));
        assert_eq!(h.session.state(), StreamState::Idle);
    }

    #[tokio::test]
    async fn test_restart_stops_previous_session_first() {
        let device = SyntheticDevice::new(frames(1000)).with_interval(Duration::from_millis(1));
        let mut h = harness(device, Handshake::Accept);
        h.session.start().await.unwrap();
        let mut first = h.peers.recv().await.unwrap();

        wait_for_state(&h.session, StreamState::Streaming).await;

        // Second start would fail with Busy if the first still held the device
        assert_ok!(h.session.start().await);
        wait_for_state(&h.session, StreamState::Streaming).await;
        assert_eq!(h.device.acquisitions(), 2);

        while first.outbound.recv().await.is_some() {}
        h.session.stop().await.unwrap();
        assert!(!h.device.is_held());
    }

    #[tokio::test]
    async fn test_restart_after_error() {
        let mut h = harness(SyntheticDevice::new(Vec::new()), Handshake::Accept);
        h.session.start().await.unwrap();
        let peer = h.peers.recv().await.unwrap();
        drop(peer);

        wait_for_state(&h.session, StreamState::Closed).await;
        assert_ok!(h.session.start().await);
        wait_for_state(&h.session, StreamState::Streaming).await;
        h.session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle() {
        let mut h = harness(SyntheticDevice::new(Vec::new()), Handshake::Accept);
        assert!(h.session.toggle().await.unwrap().is_active());
        wait_for_state(&h.session, StreamState::Streaming).await;
        assert_eq!(h.session.toggle().await.unwrap(), StreamState::Closed);
        assert!(!h.device.is_held());
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let mut h = harness(SyntheticDevice::new(Vec::new()), Handshake::Accept);
        h.session.start().await.unwrap();
        wait_for_state(&h.session, StreamState::Streaming).await;
        h.session.stop().await.unwrap();

        let events = drain(&mut h.events);
        assert_eq!(
            events,
            vec![
                SessionEvent::DictationRequested,
                SessionEvent::DictationStreaming,
                SessionEvent::DictationClosed,
            ]
        );
    }

    #[tokio::test]
    async fn test_start_returns_before_handshake() {
        let mut h = harness(SyntheticDevice::new(frames(3)), Handshake::Manual);
        let started = tokio::time::timeout(Duration::from_secs(1), h.session.start()).await;
        assert_ok!(assert_ok!(started));
        assert_eq!(h.session.state(), StreamState::Requesting);
        assert!(h.device.is_held());
        h.session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_while_requesting_releases_device() {
        let mut h = harness(SyntheticDevice::new(frames(3)), Handshake::Manual);
        h.session.start().await.unwrap();
        // Connected to the service, which never answers
        let mut peer = h.peers.recv().await.unwrap();
        assert_eq!(h.session.state(), StreamState::Requesting);

        let stopped = tokio::time::timeout(Duration::from_secs(2), h.session.stop()).await;
        assert_ok!(assert_ok!(stopped));
        assert_eq!(h.session.state(), StreamState::Closed);
        assert!(!h.device.is_held());
        assert_eq!(h.device.frames_emitted(), 0);
        assert!(peer.outbound.recv().await.is_none());

        assert_eq!(
            drain(&mut h.events),
            vec![SessionEvent::DictationRequested, SessionEvent::DictationClosed]
        );
    }

    #[tokio::test]
    async fn test_stop_while_connected_releases_device() {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel();
        let inner = SyntheticDevice::new(frames(5));
        let device = GatedDevice {
            inner: inner.clone(),
            gate: Mutex::new(Some(gate_rx)),
        };
        let (connector, mut peers) = MemoryConnector::new(Handshake::Accept);
        let (event_tx, mut events) = broadcast::channel(64);
        let mut session =
            StreamSession::new(Arc::new(device), Arc::new(connector), format(), event_tx);

        session.start().await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        wait_for_state(&session, StreamState::Connected).await;

        let open_gate = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate_tx.send(()).unwrap();
        };
        let (stopped, ()) = tokio::join!(session.stop(), open_gate);
        assert_ok!(stopped);
        assert_eq!(session.state(), StreamState::Closed);
        assert!(!inner.is_held());
        // No frame went out for a session that never streamed
        assert!(peer.outbound.recv().await.is_none());

        let events = drain(&mut events);
        assert!(!events.contains(&SessionEvent::DictationStreaming));
        assert_eq!(events.last(), Some(&SessionEvent::DictationClosed));
    }

    #[tokio::test]
    async fn test_outbound_failure_mid_stream() {
        let device = SyntheticDevice::new(frames(1000)).with_interval(Duration::from_millis(2));
        let mut h = harness(device, Handshake::Accept);
        h.session.start().await.unwrap();
        let MemoryPeer {
            mut outbound,
            inbound,
        } = h.peers.recv().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), outbound.recv())
            .await
            .expect("timed out waiting for audio chunk")
            .expect("outbound closed");
        inbound
            .send(InboundMessage::TranscriptFragment {
                text: "so far".to_string(),
            })
            .unwrap();
        let pending = h.session.pending_text();
        tokio::time::timeout(Duration::from_secs(5), async {
            while pending.text() != "so far" {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fragment not merged");

        // The service side stops reading audio
        drop(outbound);

        wait_for_state(&h.session, StreamState::Errored).await;
        assert!(!h.device.is_held());
        assert_eq!(h.session.pending_text().text(), "so far");
        assert!(drain(&mut h.events)
            .iter()
            .any(|e| matches!(e, SessionEvent::DictationErrored { .. })));
        drop(inbound);
    }

    #[tokio::test]
    async fn test_capture_stream_failure_errors_session() {
        let device = SyntheticDevice::new(frames(3)).with_stream_failure();
        let mut h = harness(device, Handshake::Accept);
        h.session.start().await.unwrap();
        let mut peer = h.peers.recv().await.unwrap();

        for _ in 0..3 {
            next_chunk(&mut peer).await;
        }
        wait_for_state(&h.session, StreamState::Errored).await;
        assert!(!h.device.is_held());

        let events = drain(&mut h.events);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::DictationErrored { reason }) if reason.contains("stopped delivering")
        ));
    }
}
