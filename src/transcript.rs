//! Dictated text staging
//!
//! `TranscriptBuffer` is the pending text the streaming session appends
//! fragments to. It only ever grows, so readers track how far they have
//! consumed by byte offset. `DraftInput` is the text-entry side: it absorbs
//! new dictation into the draft and hands the draft downstream on submit.

use std::sync::{Arc, RwLock};

/// Append-only pending text shared between the stream and its readers
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    text: Arc<RwLock<String>>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment as one indivisible step
    pub fn append(&self, fragment: &str) {
        let mut text = self.text.write().unwrap_or_else(|e| e.into_inner());
        text.push_str(fragment);
    }

    /// Full text accumulated so far
    pub fn text(&self) -> String {
        self.text.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Length in bytes; also the offset of the next fragment
    pub fn len(&self) -> usize {
        self.text.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text appended since `offset`, with the offset to pass next time.
    ///
    /// Returns `None` if `offset` is past the end or not on a character
    /// boundary, which means it did not come from this buffer.
    pub fn read_from(&self, offset: usize) -> Option<(String, usize)> {
        let text = self.text.read().unwrap_or_else(|e| e.into_inner());
        let tail = text.get(offset..)?;
        Some((tail.to_string(), text.len()))
    }
}

/// The user's draft command, fed by typing and dictation
#[derive(Debug, Clone, Default)]
pub struct DraftInput {
    text: String,
    consumed: usize,
}

impl DraftInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any dictation that arrived since the last call.
    ///
    /// Returns the number of bytes added to the draft.
    pub fn absorb(&mut self, pending: &TranscriptBuffer) -> usize {
        match pending.read_from(self.consumed) {
            Some((tail, next)) => {
                self.text.push_str(&tail);
                self.consumed = next;
                tail.len()
            }
            None => 0,
        }
    }

    /// Append typed text
    pub fn push_str(&mut self, typed: &str) {
        self.text.push_str(typed);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Take the draft for downstream handling, leaving it empty.
    ///
    /// A blank draft is not submitted.
    pub fn submit(&mut self) -> Option<String> {
        if self.text.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.text))
    }
}
