//! Undo/redo history for the project snapshot
//!
//! - `HistoryLog`: bounded ring of immutable snapshots with a cursor
//! - `HistoryManager`: commit/undo/redo over a caller-owned `SessionContext`

mod log;
mod manager;

pub use log::{HistoryEntry, HistoryLog};
pub use manager::{HistoryManager, SessionContext};
