//! Dictation streaming module
//!
//! Provides an explicit state machine for the microphone-to-transcriber
//! session:
//! - Idle: never started
//! - Requesting / Connected: acquiring the device and opening the channel
//! - Streaming: frames flow out, transcript fragments flow in
//! - Closed / Errored: terminal until the next start

mod session;
mod state;

pub use session::{StreamError, StreamSession};
pub use state::StreamState;
