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

use tracing::{info, warn};

use crate::error::UploadError;

/// Where a chunked transfer currently is, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPhase {
    /// A chunk finished; `completed` of `total` are done.
    Transferring { completed: usize, total: usize },
    /// All chunks are up, the merge request is about to be issued.
    Merging,
    /// The server deferred the merge; waiting for it to resolve.
    Waiting,
}

/// One failed file, as recorded in the batch summary.
#[derive(Debug, Clone)]
pub struct FailedUpload {
    pub path:  String,
    pub error: String,
    pub size:  u64,
}

/// Aggregate progress across a batch. Owned and mutated exclusively by the
/// upload queue; observers only ever see shared references.
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    pub total_files:     usize,
    pub total_bytes:     u64,
    pub completed_files: usize,
    pub completed_bytes: u64,
    pub failures:        Vec<FailedUpload>,
}

impl BatchProgress {
    #[must_use]
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            total_files,
            total_bytes,
            ..Self::default()
        }
    }

    /// Overall percentage by bytes. Failed files count as completed bytes,
    /// keeping the figure monotonic across a batch.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let pct = (self.completed_bytes * 100 / self.total_bytes) as u8;
        pct.min(100)
    }

    pub(crate) fn record_success(&mut self, size: u64) {
        self.completed_files += 1;
        self.completed_bytes += size;
    }

    pub(crate) fn record_failure(&mut self, path: String, error: String, size: u64) {
        self.completed_files += 1;
        self.completed_bytes += size;
        self.failures.push(FailedUpload { path, error, size });
    }
}

/// Terminal report for a batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub success_count: usize,
    pub fail_count:    usize,
    pub failures:      Vec<FailedUpload>,
}

/// Receives queue and engine progress. Called from the queue's single task;
/// implementations should return quickly.
pub trait ProgressObserver: Send + Sync {
    fn batch_started(&self, _progress: &BatchProgress) {}

    fn file_started(&self, _index: usize, _path: &str, _size: u64) {}

    fn chunk_progress(&self, _path: &str, _phase: ChunkPhase) {}

    fn file_succeeded(&self, _path: &str, _progress: &BatchProgress) {}

    fn file_failed(&self, _path: &str, _error: &UploadError, _progress: &BatchProgress) {}

    fn batch_finished(&self, _summary: &BatchSummary) {}
}

/// Observer that discards everything.
pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Observer that reports through tracing.
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn batch_started(&self, progress: &BatchProgress) {
        info!(
            files = progress.total_files,
            bytes = progress.total_bytes,
            "starting upload batch"
        );
    }

    fn file_started(&self, index: usize, path: &str, size: u64) {
        info!(file = index + 1, path, size, "uploading");
    }

    fn chunk_progress(&self, path: &str, phase: ChunkPhase) {
        match phase {
            ChunkPhase::Transferring { completed, total } => {
                info!(path, completed, total, "chunk finished");
            }
            ChunkPhase::Merging => info!(path, "merging chunks"),
            ChunkPhase::Waiting => info!(path, "waiting for merge to complete"),
        }
    }

    fn file_succeeded(&self, path: &str, progress: &BatchProgress) {
        info!(path, percent = progress.percent(), "upload finished");
    }

    fn file_failed(&self, path: &str, error: &UploadError, progress: &BatchProgress) {
        warn!(path, %error, percent = progress.percent(), "upload failed");
    }

    fn batch_finished(&self, summary: &BatchSummary) {
        if summary.fail_count > 0 {
            warn!(
                succeeded = summary.success_count,
                failed = summary.fail_count,
                "batch finished with failures"
            );
            for failure in &summary.failures {
                warn!(path = %failure.path, error = %failure.error, "failed file");
            }
        } else {
            info!(succeeded = summary.success_count, "batch finished");
        }
    }
}

/// Signal the host that the server-side file listing may have changed.
pub trait ListingNotifier: Send + Sync {
    fn listing_changed(&self);
}

/// Notifier that does nothing.
pub struct NullNotifier;

impl ListingNotifier for NullNotifier {
    fn listing_changed(&self) {}
}
