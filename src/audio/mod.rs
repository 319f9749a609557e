//! Audio capture and framing
//!
//! Capture devices deliver fixed-size mono frames over a channel; frames are
//! quantized to PCM16 and base64-encoded for the transcription channel.

mod capture;
mod frame;
#[cfg(feature = "microphone")]
mod microphone;

pub use capture::{
    CaptureDevice, CaptureError, CaptureFormat, CaptureHandle, FrameSender, FrameSink,
    SyntheticDevice,
    UnavailableDevice,
};
pub use frame::{decode_pcm16_base64, quantize, to_mono, AudioFrame, FrameAssembler};
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneDevice;
