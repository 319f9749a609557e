//! Configuration loading and management

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Capture sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
/// Samples per captured audio frame
pub const DEFAULT_FRAME_SIZE: usize = 4096;
/// Maximum number of undo/redo entries kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
/// Lower bound of the style intensity
pub const INTENSITY_MIN: u8 = 0;
/// Upper bound of the style intensity
pub const INTENSITY_MAX: u8 = 100;

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub history_capacity: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Directory backing the snapshot key-value store
    pub store_dir: PathBuf,

    /// Transcription relay address, if dictation is enabled
    pub transcriber_addr: Option<SocketAddr>,

    pub tunables: Tunables,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("STUDIO_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("studio-daemon")
            }
        };

        let socket_path = data_dir.join("daemon.sock");
        let store_dir = data_dir.join("store");

        let transcriber_addr = lookup("STUDIO_TRANSCRIBER_ADDR")
            .map(|addr| addr.parse::<SocketAddr>())
            .transpose()
            .context("invalid STUDIO_TRANSCRIBER_ADDR")?;

        let defaults = Tunables::default();
        let tunables = Tunables {
            sample_rate: parse_or(&lookup, "STUDIO_SAMPLE_RATE", defaults.sample_rate)?,
            frame_size: parse_or(&lookup, "STUDIO_FRAME_SIZE", defaults.frame_size)?,
            history_capacity: parse_or(
                &lookup,
                "STUDIO_HISTORY_CAPACITY",
                defaults.history_capacity,
            )?,
        };
        anyhow::ensure!(tunables.sample_rate > 0, "STUDIO_SAMPLE_RATE must be positive");
        anyhow::ensure!(tunables.frame_size > 0, "STUDIO_FRAME_SIZE must be positive");
        anyhow::ensure!(
            tunables.history_capacity > 0,
            "STUDIO_HISTORY_CAPACITY must be positive"
        );

        Ok(Self {
            socket_path,
            data_dir,
            store_dir,
            transcriber_addr,
            tunables,
        })
    }

    /// Ensure data directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.store_dir)?;
        Ok(())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
