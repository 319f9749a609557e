//! Structural edit actions
//!
//! Each action is validated against the current snapshot and turned into a
//! `SnapshotPatch`. Nothing here mutates state; the patch is committed to the
//! history by the caller.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{
    Asset, AssetKind, Folder, Intensity, LifecycleState, ProjectSnapshot, SnapshotPatch,
    DEFAULT_FOLDER_ID,
};

/// A file handed over by the import surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedFile {
    pub source_ref: String,
    pub name: String,
    pub mime_type: String,
}

/// User edit actions that produce a history commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditAction {
    /// Add imported files to the top of the asset list
    ImportFiles { files: Vec<ImportedFile> },
    /// Add a generated image to the top of the asset list
    AddGenerated { source_ref: String },
    DeleteAsset { id: String },
    RenameAsset { id: String, name: String },
    MoveAsset { id: String, folder_id: String },
    CreateFolder { name: String },
    SelectStyle { style_id: String },
    SetIntensity { value: i64 },
}

/// Reasons an edit action is rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    #[error("no asset with id {0}")]
    UnknownAsset(String),

    #[error("no folder with id {0}")]
    UnknownFolder(String),

    #[error("name must not be blank")]
    BlankName,

    #[error("intensity {0} is outside 0..=100")]
    IntensityOutOfRange(i64),

    #[error("nothing to import")]
    NothingToImport,
}

impl EditAction {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            EditAction::ImportFiles { .. } => "import_files",
            EditAction::AddGenerated { .. } => "add_generated",
            EditAction::DeleteAsset { .. } => "delete_asset",
            EditAction::RenameAsset { .. } => "rename_asset",
            EditAction::MoveAsset { .. } => "move_asset",
            EditAction::CreateFolder { .. } => "create_folder",
            EditAction::SelectStyle { .. } => "select_style",
            EditAction::SetIntensity { .. } => "set_intensity",
        }
    }

    /// Validate the action against `current` and build the patch to commit
    pub fn to_patch(&self, current: &ProjectSnapshot) -> Result<SnapshotPatch, EditError> {
        match self {
            EditAction::ImportFiles { files } => {
                if files.is_empty() {
                    return Err(EditError::NothingToImport);
                }
                let mut assets: Vec<Asset> = files.iter().map(imported_asset).collect();
                assets.extend(current.assets.iter().cloned());
                Ok(SnapshotPatch::assets(assets))
            }

            EditAction::AddGenerated { source_ref } => {
                let asset = Asset {
                    id: new_id(),
                    source_ref: source_ref.clone(),
                    display_name: format!("AI_Gen_{}.png", unix_millis()),
                    duration: AssetKind::Image.placeholder_duration().to_string(),
                    kind: AssetKind::Image,
                    lifecycle_state: LifecycleState::Generated,
                    folder_id: Some(DEFAULT_FOLDER_ID.to_string()),
                };
                let mut assets = Vec::with_capacity(current.assets.len() + 1);
                assets.push(asset);
                assets.extend(current.assets.iter().cloned());
                Ok(SnapshotPatch::assets(assets))
            }

            EditAction::DeleteAsset { id } => {
                if current.asset(id).is_none() {
                    return Err(EditError::UnknownAsset(id.clone()));
                }
                let assets = current
                    .assets
                    .iter()
                    .filter(|a| &a.id != id)
                    .cloned()
                    .collect();
                Ok(SnapshotPatch::assets(assets))
            }

            EditAction::RenameAsset { id, name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(EditError::BlankName);
                }
                let assets = update_asset(current, id, |a| a.display_name = name.to_string())?;
                Ok(SnapshotPatch::assets(assets))
            }

            EditAction::MoveAsset { id, folder_id } => {
                if !current.has_folder(folder_id) {
                    return Err(EditError::UnknownFolder(folder_id.clone()));
                }
                let assets = update_asset(current, id, |a| a.folder_id = Some(folder_id.clone()))?;
                Ok(SnapshotPatch::assets(assets))
            }

            EditAction::CreateFolder { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(EditError::BlankName);
                }
                let mut folders = current.folders.clone();
                folders.push(Folder {
                    id: new_id(),
                    name: name.to_string(),
                });
                Ok(SnapshotPatch::folders(folders))
            }

            // Unknown style ids are allowed; they preview as the identity transform
            EditAction::SelectStyle { style_id } => Ok(SnapshotPatch::style(style_id.clone())),

            EditAction::SetIntensity { value } => Intensity::new(*value)
                .map(SnapshotPatch::intensity)
                .ok_or(EditError::IntensityOutOfRange(*value)),
        }
    }
}

fn imported_asset(file: &ImportedFile) -> Asset {
    let kind = AssetKind::from_mime(&file.mime_type);
    Asset {
        id: new_id(),
        source_ref: file.source_ref.clone(),
        display_name: file.name.clone(),
        duration: kind.placeholder_duration().to_string(),
        kind,
        lifecycle_state: LifecycleState::Ready,
        folder_id: Some(DEFAULT_FOLDER_ID.to_string()),
    }
}

fn update_asset(
    current: &ProjectSnapshot,
    id: &str,
    apply: impl FnOnce(&mut Asset),
) -> Result<Vec<Asset>, EditError> {
    let mut assets = current.assets.clone();
    let asset = assets
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| EditError::UnknownAsset(id.to_string()))?;
    apply(asset);
    Ok(assets)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
