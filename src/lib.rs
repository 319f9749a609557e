//! studio-daemon: background daemon for a single-user media studio
//!
//! Provides:
//! - A project snapshot with bounded undo/redo history
//! - Key-value persistence and rehydration of the snapshot
//! - Style preview transforms for the selected style and intensity
//! - Microphone dictation streamed to a transcription service
//! - IPC server for UI communication

pub mod audio;
pub mod config;
pub mod engine;
pub mod events;
pub mod framing;
pub mod history;
pub mod ipc;
pub mod lifecycle;
pub mod persistence;
pub mod preview;
pub mod project;
pub mod stream;
pub mod studio;
pub mod transcript;
pub mod transport;
