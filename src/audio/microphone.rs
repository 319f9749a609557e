//! Default input device capture through cpal
//!
//! The cpal stream is not `Send` on every platform, so it lives on a
//! dedicated capture thread for its whole life. Stopping signals that thread
//! and joins it; the stream is dropped, and the device released, before
//! `stop` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tracing::{error, info};

use super::capture::{
    CaptureDevice, CaptureError, CaptureFormat, CaptureHandle, FrameSender, FrameSink,
};
use super::frame::{to_mono, FrameAssembler};

/// The system default microphone
#[derive(Debug, Default)]
pub struct MicrophoneDevice {
    held: Arc<AtomicBool>,
}

impl MicrophoneDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureDevice for MicrophoneDevice {
    fn acquire(&self, format: CaptureFormat) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::Unavailable("no default input device".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "default input".to_string());

        if self.held.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Busy);
        }
        info!(device = %name, ?format, "microphone acquired");

        Ok(Box::new(MicrophoneHandle {
            format,
            held: Arc::clone(&self.held),
            worker: None,
            stop_tx: None,
            released: false,
        }))
    }
}

struct MicrophoneHandle {
    format: CaptureFormat,
    held: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    released: bool,
}

impl CaptureHandle for MicrophoneHandle {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        if self.released || self.worker.is_some() {
            return Err(CaptureError::Stream("handle already used".to_string()));
        }

        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), CaptureError>>();
        let format = self.format;

        let worker = thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(format, frames) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CaptureError::Stream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Either an explicit stop or the handle being dropped ends capture
                let _ = stop_rx.recv();
                drop(stream);
                info!("microphone stream closed");
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Stream("capture thread exited".to_string())));
        self.worker = Some(worker);
        self.stop_tx = Some(stop_tx);
        if ready.is_err() {
            self.stop();
        }
        ready
    }

    fn stop(&mut self) {
        if self.released {
            return;
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("microphone capture thread panicked");
            }
        }
        self.released = true;
        self.held.store(false, Ordering::SeqCst);
        info!("microphone released");
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build an input stream that downmixes, resamples and frames into `frames`
fn build_stream(format: CaptureFormat, frames: FrameSender) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::Unavailable("no default input device".to_string()))?;
    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

    let device_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_config: StreamConfig = config.clone().into();
    let target_rate = format.sample_rate;
    let mut assembler = FrameAssembler::new(format.frame_size);
    let sink = FrameSink::new(frames);
    let error_sink = sink.clone();

    let mut deliver = move |samples: &[f32]| {
        let mono = to_mono(samples, channels, device_rate, target_rate);
        for frame in assembler.push(&mono) {
            if !sink.send(frame) {
                return;
            }
        }
    };
    // Ending the frame stream surfaces the error to the session
    let on_error = move |err: cpal::StreamError| {
        error!(%err, "microphone stream error, ending capture");
        error_sink.close();
    };

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| deliver(data),
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                deliver(&converted)
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::Unavailable(format!(
                "unsupported sample format {other:?}"
            )))
        }
    };

    stream.map_err(|e| CaptureError::Stream(e.to_string()))
}
