//! Mirrors the live snapshot into durable storage
//!
//! Each of the four snapshot fields is written under its own key. Writes are
//! fire-and-forget: a failed write is logged and the session carries on,
//! since the in-memory snapshot stays authoritative for the whole session.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::project::{Asset, Folder, Intensity, ProjectSnapshot};

use super::store::KeyValueStore;

/// Storage key of the serialized asset sequence
pub const ASSETS_KEY: &str = "assets";
/// Storage key of the serialized folder set
pub const FOLDERS_KEY: &str = "folders";
/// Storage key of the selected style id
pub const SELECTED_STYLE_KEY: &str = "selectedStyle";
/// Storage key of the intensity as a decimal string
pub const INTENSITY_KEY: &str = "intensity";

/// Synchronizes snapshots with a key-value store
#[derive(Clone)]
pub struct PersistenceSync {
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceSync {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Write all four fields, overwriting previous values
    pub fn persist(&self, snapshot: &ProjectSnapshot) {
        match serde_json::to_string(&snapshot.assets) {
            Ok(json) => self.write(ASSETS_KEY, &json),
            Err(e) => warn!(?e, "failed to serialize assets"),
        }
        match serde_json::to_string(&snapshot.folders) {
            Ok(json) => self.write(FOLDERS_KEY, &json),
            Err(e) => warn!(?e, "failed to serialize folders"),
        }
        self.write(SELECTED_STYLE_KEY, &snapshot.selected_style_id);
        self.write(INTENSITY_KEY, &snapshot.intensity.to_string());

        debug!(
            assets = snapshot.assets.len(),
            folders = snapshot.folders.len(),
            "snapshot persisted"
        );
    }

    /// Rebuild a snapshot from storage.
    ///
    /// Each field falls back to its default independently when the key is
    /// absent or unreadable.
    pub fn rehydrate(&self) -> ProjectSnapshot {
        let assets = self
            .read_json::<Vec<Asset>>(ASSETS_KEY)
            .unwrap_or_else(ProjectSnapshot::seed_assets);
        let folders = self
            .read_json::<Vec<Folder>>(FOLDERS_KEY)
            .filter(|folders| has_unique_ids(folders))
            .unwrap_or_else(ProjectSnapshot::seed_folders);
        let selected_style_id = self
            .read(SELECTED_STYLE_KEY)
            .filter(|style| !style.is_empty())
            .unwrap_or_else(|| ProjectSnapshot::default().selected_style_id);
        let intensity = self
            .read(INTENSITY_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(Intensity::new)
            .unwrap_or_default();

        let mut snapshot = ProjectSnapshot {
            assets,
            folders,
            selected_style_id,
            intensity,
        };

        // Fields are restored independently, so a reference may now dangle
        if !snapshot.folder_refs_valid() {
            warn!("stored assets reference missing folders, moving them to unsorted");
            let valid: Vec<Option<String>> = snapshot
                .assets
                .iter()
                .map(|a| {
                    a.folder_id
                        .clone()
                        .filter(|id| snapshot.has_folder(id))
                })
                .collect();
            for (asset, folder_id) in snapshot.assets.iter_mut().zip(valid) {
                asset.folder_id = folder_id;
            }
        }

        debug!(
            assets = snapshot.assets.len(),
            folders = snapshot.folders.len(),
            style = %snapshot.selected_style_id,
            intensity = %snapshot.intensity,
            "snapshot rehydrated"
        );
        snapshot
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "persistence write failed");
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "persistence read failed, using default");
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "stored value unparsable, using default");
                None
            }
        }
    }
}

fn has_unique_ids(folders: &[Folder]) -> bool {
    let mut ids: Vec<&str> = folders.iter().map(|f| f.id.as_str()).collect();
    ids.sort_unstable();
    ids.windows(2).all(|w| w[0] != w[1])
}
