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

use std::sync::Arc;

use futures::{StreamExt, stream::FuturesUnordered};
use porter_base::readable_size::ReadableSize;
use serde_json::Value;
use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use crate::{
    config::UploaderConfig,
    error::{
        ChunkFailedSnafu, EntryReadSnafu, HttpSnafu, MergeRejectedSnafu, MergeTimeoutSnafu,
        MissingUploadIdSnafu, NetworkSnafu, ProtocolSnafu, Stage, TooManyChunksSnafu, UploadError,
    },
    progress::ChunkPhase,
    transport::{FormBody, Transport, UploadCall},
    types::{
        ChunkStatus, Entry, InitResponse, MergeOutcome, PollResponse, PollStatus, Session,
        TransferPlan,
    },
};

/// Simultaneous in-flight chunk requests per file.
const CHUNK_WINDOW: usize = 3;

/// Callback invoked from the engine's controlling task as a transfer moves
/// through its phases.
pub type ProgressFn<'a> = &'a (dyn Fn(ChunkPhase) + Send + Sync);

/// Per-file chunked transfer: negotiate a session, push chunks under the
/// concurrency window, request the merge, and ride out a deferred merge by
/// polling.
pub struct ChunkedUploader {
    transport: Arc<dyn Transport>,
    config:    UploaderConfig,
}

impl ChunkedUploader {
    pub fn new(transport: Arc<dyn Transport>, config: UploaderConfig) -> Self {
        Self { transport, config }
    }

    pub async fn upload(
        &self,
        entry: &Entry,
        plan: &TransferPlan,
        progress: ProgressFn<'_>,
    ) -> Result<MergeOutcome, UploadError> {
        ensure!(
            plan.chunk_count <= self.config.chunking.max_chunks,
            TooManyChunksSnafu {
                path:        entry.relative_path.clone(),
                size:        ReadableSize(plan.size),
                chunk_count: plan.chunk_count,
                max_chunks:  self.config.chunking.max_chunks,
                limit:       self.config.chunking.max_file_size(),
            }
        );

        let mut session = self.init_session(entry, plan).await?;
        debug!(
            path = %entry.relative_path,
            upload_id = %session.upload_id,
            chunks = plan.chunk_count,
            "chunked session initiated"
        );

        self.upload_chunks(entry, plan, &mut session, progress).await?;

        progress(ChunkPhase::Merging);
        let merged = self.request_merge(entry, plan, &session).await?;

        if Self::is_deferred(&merged) {
            progress(ChunkPhase::Waiting);
            self.poll_merge(&session).await
        } else {
            Ok(MergeOutcome::from_value(merged))
        }
    }

    async fn init_session(
        &self,
        entry: &Entry,
        plan: &TransferPlan,
    ) -> Result<Session, UploadError> {
        let mut url = self.config.upload_url()?;
        url.query_pairs_mut().append_pair("initChunked", "true");
        self.config.append_common_params(&mut url);

        let form = FormBody::new()
            .text("originalFileName", entry.relative_path.clone())
            .text("originalFileType", entry.content_type.clone())
            .text("totalChunks", plan.chunk_count.to_string());

        let response = self
            .transport
            .execute(UploadCall::post(url, form).headers(self.config.auth_headers()))
            .await
            .context(NetworkSnafu { stage: Stage::Init })?;

        ensure!(
            response.is_success(),
            HttpSnafu {
                stage:  Stage::Init,
                status: response.status,
                body:   response.body_text(),
            }
        );

        let init: InitResponse = response.json().map_err(|e| {
            ProtocolSnafu {
                stage:  Stage::Init,
                detail: e.to_string(),
            }
            .build()
        })?;
        let upload_id = init
            .upload_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MissingUploadIdSnafu.build())?;

        Ok(Session::new(upload_id, plan.chunk_count))
    }

    /// Push every chunk, dispatching in index order in runs of
    /// [`CHUNK_WINDOW`] and waiting for each run before starting the next.
    /// Completion order within a run is unconstrained. On a failure the
    /// run's in-flight requests settle, no further runs start, and the first
    /// failure is returned.
    async fn upload_chunks(
        &self,
        entry: &Entry,
        plan: &TransferPlan,
        session: &mut Session,
        progress: ProgressFn<'_>,
    ) -> Result<(), UploadError> {
        let total = plan.chunk_count;
        let upload_id = session.upload_id.clone();
        let mut completed = 0usize;
        let mut failure: Option<UploadError> = None;

        for run_start in (0..total).step_by(CHUNK_WINDOW) {
            let run_end = usize::min(run_start + CHUNK_WINDOW, total);

            let mut in_flight: FuturesUnordered<_> = (run_start..run_end)
                .map(|index| self.send_chunk(entry, plan, &upload_id, index))
                .collect();

            while let Some((index, result)) = in_flight.next().await {
                match result {
                    Ok(()) => {
                        session.chunks[index] = ChunkStatus::Completed;
                        completed += 1;
                        progress(ChunkPhase::Transferring { completed, total });
                    }
                    Err(error) => {
                        session.chunks[index] = ChunkStatus::Failed;
                        warn!(path = %entry.relative_path, chunk = index, %error, "chunk failed");
                        if failure.is_none() {
                            failure = Some(error);
                        }
                    }
                }
            }

            if let Some(error) = failure.take() {
                return Err(error);
            }
        }

        debug_assert!(session.all_completed());
        Ok(())
    }

    /// Transmit one chunk. The result carries the chunk index so the caller
    /// can update the session regardless of completion order.
    async fn send_chunk(
        &self,
        entry: &Entry,
        plan: &TransferPlan,
        upload_id: &str,
        index: usize,
    ) -> (usize, Result<(), UploadError>) {
        (index, self.try_send_chunk(entry, plan, upload_id, index).await)
    }

    async fn try_send_chunk(
        &self,
        entry: &Entry,
        plan: &TransferPlan,
        upload_id: &str,
        index: usize,
    ) -> Result<(), UploadError> {
        let start = index as u64 * plan.chunk_size;
        let len = usize::try_from(u64::min(plan.chunk_size, plan.size - start))
            .expect("chunk size fits in memory");
        let data = entry
            .content
            .read_range(start, len)
            .await
            .context(EntryReadSnafu {
                path: entry.relative_path.clone(),
            })?;

        let mut url = self.config.upload_url()?;
        url.query_pairs_mut().append_pair("chunked", "true");
        self.config.append_common_params(&mut url);

        let form = FormBody::new()
            .file("file", entry.file_name(), entry.content_type.clone(), data)
            .text("chunkIndex", index.to_string())
            .text("totalChunks", plan.chunk_count.to_string())
            .text("uploadId", upload_id)
            .text("originalFileName", entry.relative_path.clone())
            .text("originalFileType", entry.content_type.clone());

        let response = self
            .transport
            .execute(UploadCall::post(url, form).headers(self.config.auth_headers()))
            .await
            .map_err(|e| {
                ChunkFailedSnafu {
                    index,
                    total:   plan.chunk_count,
                    message: e.to_string(),
                }
                .build()
            })?;

        ensure!(
            response.is_success(),
            ChunkFailedSnafu {
                index,
                total: plan.chunk_count,
                message: format!("HTTP {}: {}", response.status, response.body_text()),
            }
        );
        Ok(())
    }

    async fn request_merge(
        &self,
        entry: &Entry,
        plan: &TransferPlan,
        session: &Session,
    ) -> Result<Value, UploadError> {
        let folder = self.config.effective_folder(entry.folder_path());

        let mut url = self.config.upload_url()?;
        url.query_pairs_mut().append_pair("chunked", "true");
        url.query_pairs_mut().append_pair("merge", "true");
        if let Some(folder) = folder {
            url.query_pairs_mut().append_pair("uploadFolder", folder);
        }
        self.config.append_common_params(&mut url);

        let mut form = FormBody::new()
            .text("uploadId", session.upload_id.clone())
            .text("totalChunks", plan.chunk_count.to_string())
            .text("originalFileName", entry.relative_path.clone())
            .text("originalFileType", entry.content_type.clone());
        if let Some(folder) = folder {
            form = form.text("uploadFolder", folder);
        }

        let response = self
            .transport
            .execute(UploadCall::post(url, form).headers(self.config.auth_headers()))
            .await
            .context(NetworkSnafu {
                stage: Stage::Merge,
            })?;

        ensure!(
            response.is_success(),
            HttpSnafu {
                stage:  Stage::Merge,
                status: response.status,
                body:   response.body_text(),
            }
        );

        response.json().map_err(|e| {
            ProtocolSnafu {
                stage:  Stage::Merge,
                detail: e.to_string(),
            }
            .build()
        })
    }

    fn is_deferred(merged: &Value) -> bool {
        merged
            .get("status")
            .and_then(Value::as_str)
            .and_then(|status| status.parse::<PollStatus>().ok())
            .is_some_and(|status| {
                matches!(status, PollStatus::Processing | PollStatus::Merging)
            })
    }

    /// Query merge status on a fixed interval until a terminal status arrives
    /// or the wait budget runs out. A non-success poll response is not
    /// terminal; the next tick retries.
    async fn poll_merge(&self, session: &Session) -> Result<MergeOutcome, UploadError> {
        let interval: std::time::Duration = self
            .config
            .poll_interval
            .try_into()
            .expect("poll interval must be non-negative");
        let budget: std::time::Duration = self
            .config
            .poll_budget
            .try_into()
            .expect("poll budget must be non-negative");
        let deadline = tokio::time::Instant::now() + budget;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return MergeTimeoutSnafu {
                    budget: self.config.poll_budget,
                }
                .fail();
            }

            let mut url = self.config.upload_url()?;
            url.query_pairs_mut().append_pair("statusCheck", "true");
            url.query_pairs_mut()
                .append_pair("uploadId", &session.upload_id);

            let response = self
                .transport
                .execute(UploadCall::get(url).headers(self.config.auth_headers()))
                .await
                .context(NetworkSnafu {
                    stage: Stage::Status,
                })?;

            if response.is_success() {
                let poll: PollResponse = response.json().map_err(|e| {
                    ProtocolSnafu {
                        stage:  Stage::Status,
                        detail: e.to_string(),
                    }
                    .build()
                })?;

                match poll.status.parse::<PollStatus>() {
                    Ok(PollStatus::Success) => {
                        let result = poll.result.clone().unwrap_or(Value::Null);
                        return Ok(MergeOutcome::from_value(result));
                    }
                    Ok(status @ (PollStatus::Error | PollStatus::Timeout)) => {
                        return MergeRejectedSnafu {
                            status,
                            detail: poll.detail(),
                        }
                        .fail();
                    }
                    Ok(PollStatus::Processing | PollStatus::Merging) => {}
                    Err(_) => {
                        return ProtocolSnafu {
                            stage:  Stage::Status,
                            detail: format!("unknown status {:?}", poll.status),
                        }
                        .fail();
                    }
                }
            } else {
                debug!(
                    upload_id = %session.upload_id,
                    status = response.status,
                    "status check unavailable, retrying"
                );
            }

            tokio::time::sleep(interval).await;
        }
    }
}
