// Copyright 2025 porter contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt, sync::Arc};

use jiff::Span;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::source::ContentSource;

/// One discovered file: a content handle, its posix relative path (directory
/// components preserved, `/`-separated), and its size in bytes.
#[derive(Clone)]
pub struct Entry {
    pub content:       Arc<dyn ContentSource>,
    pub relative_path: String,
    pub content_type:  String,
    pub size:          u64,
}

impl Entry {
    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map_or(self.relative_path.as_str(), |(_, name)| name)
    }

    /// Directory prefix of the relative path, if any.
    #[must_use]
    pub fn folder_path(&self) -> Option<&str> {
        self.relative_path.rsplit_once('/').map(|(dir, _)| dir)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("relative_path", &self.relative_path)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Per-file transfer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TransferStrategy {
    Direct,
    Chunked,
}

/// The resolved plan for one file, derived from its size and the chunking
/// configuration before any network call.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub relative_path: String,
    pub size:          u64,
    pub strategy:      TransferStrategy,
    pub chunk_size:    u64,
    pub chunk_count:   usize,
}

/// Status of a single chunk within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Completed,
    Failed,
}

/// Chunked-transfer state for one file, created from a successful
/// session-initiation response.
#[derive(Debug, Clone)]
pub struct Session {
    pub upload_id:    String,
    pub total_chunks: usize,
    pub chunks:       Vec<ChunkStatus>,
}

impl Session {
    #[must_use]
    pub fn new(upload_id: String, total_chunks: usize) -> Self {
        Self {
            upload_id,
            total_chunks,
            chunks: vec![ChunkStatus::Pending; total_chunks],
        }
    }

    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.chunks.iter().all(|c| *c == ChunkStatus::Completed)
    }
}

/// Body of a successful session-initiation response.
#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    #[serde(default, rename = "uploadId")]
    pub upload_id: Option<String>,
}

/// A stored-file reference returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub src:   String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The closed set of shapes a merge (or direct-upload, or poll) result can
/// take on the wire.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// An array of stored-file references.
    Entries(Vec<UploadedFile>),
    /// A single object carrying a `src` reference.
    Single(UploadedFile),
    /// Anything else the server chose to return, passed through untouched.
    Raw(Value),
}

impl MergeOutcome {
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        if let Ok(entries) = serde_json::from_value::<Vec<UploadedFile>>(value.clone()) {
            return Self::Entries(entries);
        }
        if let Ok(single) = serde_json::from_value::<UploadedFile>(value.clone()) {
            return Self::Single(single);
        }
        Self::Raw(value)
    }

    /// The first `src` reference, when one exists.
    #[must_use]
    pub fn first_src(&self) -> Option<&str> {
        match self {
            Self::Entries(entries) => entries.first().map(|e| e.src.as_str()),
            Self::Single(single) => Some(single.src.as_str()),
            Self::Raw(_) => None,
        }
    }

    /// The host-facing JSON shape: arrays pass through, a lone `src` object
    /// is wrapped into a one-element array, anything else passes through.
    #[must_use]
    pub fn normalized(&self) -> Value {
        match self {
            Self::Entries(entries) => serde_json::to_value(entries).unwrap_or(Value::Null),
            Self::Single(single) => {
                serde_json::to_value(std::slice::from_ref(single)).unwrap_or(Value::Null)
            }
            Self::Raw(value) => value.clone(),
        }
    }
}

/// Terminal and pending states reported by the merge-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PollStatus {
    Success,
    Processing,
    Merging,
    Error,
    Timeout,
}

/// Body of a merge-status poll response.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    pub status:  String,
    #[serde(default)]
    pub result:  Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error:   Option<String>,
}

impl PollResponse {
    /// Human detail for a terminal error status.
    #[must_use]
    pub fn detail(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| self.status.clone())
    }
}

/// The record of one completed file transfer.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub relative_path: String,
    pub size:          u64,
    pub strategy:      TransferStrategy,
    pub result:        MergeOutcome,
    pub duration:      Span,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::source::BytesContent;

    fn entry(path: &str) -> Entry {
        Entry {
            content:       Arc::new(BytesContent::from_static(b"x")),
            relative_path: path.to_string(),
            content_type:  "application/octet-stream".to_string(),
            size:          1,
        }
    }

    #[test]
    fn entry_path_components() {
        let nested = entry("docs/img/b.png");
        assert_eq!(nested.file_name(), "b.png");
        assert_eq!(nested.folder_path(), Some("docs/img"));

        let flat = entry("a.txt");
        assert_eq!(flat.file_name(), "a.txt");
        assert_eq!(flat.folder_path(), None);
    }

    #[test]
    fn merge_outcome_array_passes_through() {
        let outcome = MergeOutcome::from_value(json!([{"src": "/files/a.bin", "name": "a"}]));
        assert!(matches!(outcome, MergeOutcome::Entries(_)));
        assert_eq!(outcome.first_src(), Some("/files/a.bin"));
        assert_eq!(
            outcome.normalized(),
            json!([{"src": "/files/a.bin", "name": "a"}])
        );
    }

    #[test]
    fn merge_outcome_single_src_is_wrapped() {
        let outcome = MergeOutcome::from_value(json!({"src": "/files/a.bin"}));
        assert!(matches!(outcome, MergeOutcome::Single(_)));
        assert_eq!(outcome.first_src(), Some("/files/a.bin"));
        assert_eq!(outcome.normalized(), json!([{"src": "/files/a.bin"}]));
    }

    #[test]
    fn merge_outcome_raw_passes_through() {
        let outcome = MergeOutcome::from_value(json!({"ok": true}));
        assert!(matches!(outcome, MergeOutcome::Raw(_)));
        assert_eq!(outcome.first_src(), None);
        assert_eq!(outcome.normalized(), json!({"ok": true}));
    }

    #[test]
    fn poll_status_parses_lowercase() {
        assert_eq!("success".parse::<PollStatus>().unwrap(), PollStatus::Success);
        assert_eq!("merging".parse::<PollStatus>().unwrap(), PollStatus::Merging);
        assert!("finished".parse::<PollStatus>().is_err());
    }

    #[test]
    fn session_tracks_completion() {
        let mut session = Session::new("abc".to_string(), 3);
        assert!(!session.all_completed());
        session.chunks.fill(ChunkStatus::Completed);
        assert!(session.all_completed());
    }
}
