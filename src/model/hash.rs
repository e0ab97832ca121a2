// Content hashes used for incremental indexing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hex blake3 digest of raw file bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// The last recorded hash of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHashRecord {
    pub file_path: String,
    pub content_hash: String,
    pub last_indexed_at: DateTime<Utc>,
}
