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

use std::{sync::Arc, time::Duration};

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    chunked::ChunkedUploader,
    config::UploaderConfig,
    direct::DirectUploader,
    error::UploadError,
    progress::{BatchProgress, BatchSummary, ListingNotifier, ProgressObserver},
    transport::Transport,
    types::{Entry, TransferStrategy, UploadOutcome},
};

/// Pause inserted after a file that exceeded the chunk threshold.
const LARGE_FILE_DELAY: Duration = Duration::from_millis(500);
/// Pause inserted after any other file.
const SMALL_FILE_DELAY: Duration = Duration::from_millis(200);

/// Uploads a batch one file at a time, smallest first, aggregating progress
/// and surviving per-file failures.
pub struct UploadQueue {
    config:   UploaderConfig,
    direct:   DirectUploader,
    chunked:  ChunkedUploader,
    observer: Arc<dyn ProgressObserver>,
    notifier: Arc<dyn ListingNotifier>,
}

impl UploadQueue {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: UploaderConfig,
        observer: Arc<dyn ProgressObserver>,
        notifier: Arc<dyn ListingNotifier>,
    ) -> Self {
        Self {
            direct: DirectUploader::new(Arc::clone(&transport), config.clone()),
            chunked: ChunkedUploader::new(transport, config.clone()),
            config,
            observer,
            notifier,
        }
    }

    /// Upload every entry to completion. A failed file is recorded and the
    /// queue moves on; the batch itself never fails.
    pub async fn run(&self, mut entries: Vec<Entry>) -> BatchSummary {
        // Small files first: progress surfaces quickly and the large files
        // drain at the end.
        entries.sort_by_key(|entry| entry.size);

        let total_files = entries.len();
        let total_bytes = entries.iter().map(|entry| entry.size).sum();
        let mut progress = BatchProgress::new(total_files, total_bytes);
        self.observer.batch_started(&progress);

        let mut success_count = 0usize;
        let mut fail_count = 0usize;

        for (index, entry) in entries.iter().enumerate() {
            self.observer
                .file_started(index, &entry.relative_path, entry.size);

            match self.upload_entry(entry).await {
                Ok(outcome) => {
                    success_count += 1;
                    progress.record_success(entry.size);
                    debug!(
                        path = %outcome.relative_path,
                        strategy = %outcome.strategy,
                        src = outcome.result.first_src(),
                        duration = %outcome.duration,
                        "file uploaded"
                    );
                    self.observer.file_succeeded(&entry.relative_path, &progress);
                }
                Err(error) => {
                    fail_count += 1;
                    warn!(path = %entry.relative_path, %error, "file upload failed");
                    progress.record_failure(
                        entry.relative_path.clone(),
                        error.to_string(),
                        entry.size,
                    );
                    self.observer
                        .file_failed(&entry.relative_path, &error, &progress);
                }
            }

            // Throttle between files to bound request burstiness.
            if index + 1 < total_files {
                let delay = if entry.size > self.config.chunking.chunk_size.as_bytes() {
                    LARGE_FILE_DELAY
                } else {
                    SMALL_FILE_DELAY
                };
                tokio::time::sleep(delay).await;
            }
        }

        let summary = BatchSummary {
            success_count,
            fail_count,
            failures: progress.failures.clone(),
        };
        self.observer.batch_finished(&summary);
        self.notifier.listing_changed();
        summary
    }

    /// Upload a single entry under the strategy its plan selects.
    pub async fn upload_entry(&self, entry: &Entry) -> Result<UploadOutcome, UploadError> {
        let started = Timestamp::now();
        let plan = self
            .config
            .chunking
            .plan(&entry.relative_path, entry.size)?;

        let result = match plan.strategy {
            TransferStrategy::Direct => self.direct.upload(entry).await?,
            TransferStrategy::Chunked => {
                let observer = Arc::clone(&self.observer);
                let path = entry.relative_path.clone();
                self.chunked
                    .upload(entry, &plan, &move |phase| {
                        observer.chunk_progress(&path, phase);
                    })
                    .await?
            }
        };

        Ok(UploadOutcome {
            relative_path: entry.relative_path.clone(),
            size: entry.size,
            strategy: plan.strategy,
            result,
            duration: started.until(Timestamp::now()).unwrap_or_default(),
        })
    }
}
