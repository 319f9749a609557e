//! Durable persistence of the project snapshot

mod store;
mod sync;

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use sync::{PersistenceSync, ASSETS_KEY, FOLDERS_KEY, INTENSITY_KEY, SELECTED_STYLE_KEY};
