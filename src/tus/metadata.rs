//! Structured metadata attached to an upload session
//!
//! The resumable-upload endpoint receives its bookkeeping (target path,
//! zone, ownership, classification flags, nested descriptive metadata) as a
//! single `Upload-Metadata` header of comma-separated `key base64(value)`
//! pairs, sent once with the create-resource request.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Key/value metadata for one upload session.
///
/// Backed by an ordered map so the encoded header is deterministic.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    entries: BTreeMap<String, String>,
}

impl UploadMetadata {
    pub fn new() -> Self {
        UploadMetadata::default()
    }

    /// Set one metadata field, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style [`UploadMetadata::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as the `Upload-Metadata` header value.
    pub fn encode_header(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("{key} {}", STANDARD.encode(value)))
            .collect::<Vec<_>>()
            .join(",")
    }
}
