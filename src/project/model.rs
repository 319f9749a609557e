//! Project snapshot data model
//!
//! A `ProjectSnapshot` is the complete editable state of a project at one
//! instant. It is plain data: every change goes through a history commit.

use serde::{Deserialize, Serialize};

use crate::config::{INTENSITY_MAX, INTENSITY_MIN};
use crate::preview::DEFAULT_STYLE_ID;

/// Reserved folder id for unsorted media. Always valid as a folder reference.
pub const DEFAULT_FOLDER_ID: &str = "default";

/// Intensity used when nothing has been stored yet
pub const DEFAULT_INTENSITY: u8 = 75;

/// Media kind of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Video,
    Image,
}

impl AssetKind {
    /// Classify an imported file by its mime type
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("video") {
            Self::Video
        } else {
            Self::Image
        }
    }

    /// Placeholder duration label shown before media metadata is known
    pub fn placeholder_duration(&self) -> &'static str {
        match self {
            AssetKind::Video => "--:--",
            AssetKind::Image => "IMG",
        }
    }
}

/// Where an asset is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "uploading")]
    Uploading,
    /// Produced by the generator rather than imported
    #[serde(rename = "generated", alias = "ai-generated")]
    Generated,
}

/// A clip or image in the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    /// Opaque locator (file URL, object URL, data URI)
    #[serde(rename = "url")]
    pub source_ref: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub duration: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(rename = "status")]
    pub lifecycle_state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

/// A named bucket for assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

/// Style strength, always within the intensity range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    /// Create an intensity, returning `None` if out of range
    pub fn new(value: i64) -> Option<Self> {
        if (INTENSITY_MIN as i64..=INTENSITY_MAX as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Intensity mapped onto [0, 1]
    pub fn normalized(&self) -> f64 {
        f64::from(self.0) / f64::from(INTENSITY_MAX)
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self(DEFAULT_INTENSITY)
    }
}

impl TryFrom<i64> for Intensity {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!("intensity {value} outside {INTENSITY_MIN}..={INTENSITY_MAX}")
        })
    }
}

impl From<Intensity> for u8 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The complete editable project state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub assets: Vec<Asset>,
    pub folders: Vec<Folder>,
    pub selected_style_id: String,
    pub intensity: Intensity,
}

impl ProjectSnapshot {
    /// Seed asset shown in a brand new project
    pub fn seed_assets() -> Vec<Asset> {
        vec![Asset {
            id: "1".to_string(),
            source_ref: "https://sample-videos.com/video123/mp4/720/big_buck_bunny_720p_1mb.mp4"
                .to_string(),
            display_name: "Main_Shot_01.mp4".to_string(),
            duration: "0:14".to_string(),
            kind: AssetKind::Video,
            lifecycle_state: LifecycleState::Ready,
            folder_id: None,
        }]
    }

    /// Seed folder holding unsorted media
    pub fn seed_folders() -> Vec<Folder> {
        vec![Folder {
            id: DEFAULT_FOLDER_ID.to_string(),
            name: "Project Media".to_string(),
        }]
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Whether `folder_id` can be referenced by an asset
    pub fn has_folder(&self, folder_id: &str) -> bool {
        folder_id == DEFAULT_FOLDER_ID || self.folders.iter().any(|f| f.id == folder_id)
    }

    /// Check that every asset's folder reference resolves
    pub fn folder_refs_valid(&self) -> bool {
        self.assets
            .iter()
            .filter_map(|a| a.folder_id.as_deref())
            .all(|id| self.has_folder(id))
    }

    /// Merge a partial update; absent fields are taken from `self`
    pub fn merged(&self, patch: SnapshotPatch) -> Self {
        Self {
            assets: patch.assets.unwrap_or_else(|| self.assets.clone()),
            folders: patch.folders.unwrap_or_else(|| self.folders.clone()),
            selected_style_id: patch
                .selected_style_id
                .unwrap_or_else(|| self.selected_style_id.clone()),
            intensity: patch.intensity.unwrap_or(self.intensity),
        }
    }
}

impl Default for ProjectSnapshot {
    fn default() -> Self {
        Self {
            assets: Self::seed_assets(),
            folders: Self::seed_folders(),
            selected_style_id: DEFAULT_STYLE_ID.to_string(),
            intensity: Intensity::default(),
        }
    }
}

/// A partial field update to be merged into the current snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotPatch {
    pub assets: Option<Vec<Asset>>,
    pub folders: Option<Vec<Folder>>,
    pub selected_style_id: Option<String>,
    pub intensity: Option<Intensity>,
}

impl SnapshotPatch {
    pub fn assets(assets: Vec<Asset>) -> Self {
        Self {
            assets: Some(assets),
            ..Self::default()
        }
    }

    pub fn folders(folders: Vec<Folder>) -> Self {
        Self {
            folders: Some(folders),
            ..Self::default()
        }
    }

    pub fn style(style_id: impl Into<String>) -> Self {
        Self {
            selected_style_id: Some(style_id.into()),
            ..Self::default()
        }
    }

    pub fn intensity(intensity: Intensity) -> Self {
        Self {
            intensity: Some(intensity),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot() {
        let snapshot = ProjectSnapshot::default();
        assert_eq!(snapshot.assets.len(), 1);
        assert_eq!(snapshot.folders.len(), 1);
        assert_eq!(snapshot.folders[0].id, DEFAULT_FOLDER_ID);
        assert_eq!(snapshot.selected_style_id, "cyberpunk");
        assert_eq!(snapshot.intensity.value(), 75);
        assert!(snapshot.folder_refs_valid());
    }

    #[test]
    fn test_intensity_bounds() {
        assert!(Intensity::new(0).is_some());
        assert!(Intensity::new(100).is_some());
        assert!(Intensity::new(-1).is_none());
        assert!(Intensity::new(101).is_none());
        assert_eq!(Intensity::new(50).unwrap().normalized(), 0.5);
    }

    #[test]
    fn test_intensity_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Intensity>("101").is_err());
        let intensity: Intensity = serde_json::from_str("40").unwrap();
        assert_eq!(intensity.value(), 40);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let snapshot = ProjectSnapshot::default();
        let merged = snapshot.merged(SnapshotPatch::style("anime"));
        assert_eq!(merged.selected_style_id, "anime");
        assert_eq!(merged.assets, snapshot.assets);
        assert_eq!(merged.folders, snapshot.folders);
        assert_eq!(merged.intensity, snapshot.intensity);
    }

    #[test]
    fn test_asset_serialization() {
        let asset = Asset {
            id: "7".to_string(),
            source_ref: "blob:abc".to_string(),
            display_name: "clip.mp4".to_string(),
            duration: "--:--".to_string(),
            kind: AssetKind::Video,
            lifecycle_state: LifecycleState::Generated,
            folder_id: Some(DEFAULT_FOLDER_ID.to_string()),
        };
        let json = serde_json::to_string(&asset).unwrap();
        assert!(json.contains(r#""type":"video""#));
        assert!(json.contains(r#""status":"generated""#));
        assert!(json.contains(r#""folderId":"default""#));
    }

    #[test]
    fn test_lifecycle_state_legacy_name() {
        let state: LifecycleState = serde_json::from_str(r#""ai-generated""#).unwrap();
        assert_eq!(state, LifecycleState::Generated);
        assert_eq!(serde_json::to_string(&state).unwrap(), r#""generated""#);
    }

    #[test]
    fn test_unknown_folder_reference_invalid() {
        let mut snapshot = ProjectSnapshot::default();
        snapshot.assets[0].folder_id = Some("missing".to_string());
        assert!(!snapshot.folder_refs_valid());
    }
}
