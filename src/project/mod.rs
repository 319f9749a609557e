//! Project snapshot store
//!
//! Plain data describing the editable project plus the typed edit actions
//! that turn into history commits.

mod edit;
mod model;

pub use edit::{EditAction, EditError, ImportedFile};
pub use model::{
    Asset, AssetKind, Folder, Intensity, LifecycleState, ProjectSnapshot, SnapshotPatch,
    DEFAULT_FOLDER_ID, DEFAULT_INTENSITY,
};
