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

use crate::{
    config::UploaderConfig,
    enumerate::enumerate,
    error::UploadError,
    intercept::InterceptClient,
    progress::{BatchSummary, ListingNotifier, NullNotifier, NullObserver, ProgressObserver},
    queue::UploadQueue,
    source::DropEntry,
    transport::{HttpTransport, Transport},
    types::{Entry, UploadOutcome},
};

/// Entry point tying the pieces together.
///
/// Components:
/// - `enumerate`: walks a drop payload into a flat entry list
/// - `UploadQueue`: sequential per-file scheduling and batch progress
/// - `DirectUploader` / `ChunkedUploader`: the two transfer strategies
/// - `InterceptClient`: reroutes a host's own oversized upload calls
pub struct Uploader {
    config:    UploaderConfig,
    transport: Arc<dyn Transport>,
    observer:  Arc<dyn ProgressObserver>,
    notifier:  Arc<dyn ListingNotifier>,
}

impl Uploader {
    /// Create an uploader speaking HTTP.
    #[must_use]
    pub fn new(config: UploaderConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config));
        Self::with_transport(config, transport)
    }

    /// Create an uploader over an injected transport.
    pub fn with_transport(config: UploaderConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            observer: Arc::new(NullObserver),
            notifier: Arc::new(NullNotifier),
        }
    }

    /// Replace the progress observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the listing-changed notifier.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn ListingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Enumerate a drop payload and upload everything it contains.
    pub async fn upload_batch(&self, roots: Vec<Box<dyn DropEntry>>) -> BatchSummary {
        let entries = enumerate(roots).await;
        self.upload_entries(entries).await
    }

    /// Upload already-enumerated entries.
    pub async fn upload_entries(&self, entries: Vec<Entry>) -> BatchSummary {
        self.queue().run(entries).await
    }

    /// Upload one entry, bypassing batch bookkeeping.
    pub async fn upload_entry(&self, entry: &Entry) -> Result<UploadOutcome, UploadError> {
        self.queue().upload_entry(entry).await
    }

    /// A client the host application can route its own upload calls
    /// through; oversized submissions are diverted into the chunked engine.
    #[must_use]
    pub fn intercept_client(&self) -> InterceptClient {
        InterceptClient::new(Arc::clone(&self.transport), self.config.clone())
    }

    fn queue(&self) -> UploadQueue {
        UploadQueue::new(
            Arc::clone(&self.transport),
            self.config.clone(),
            Arc::clone(&self.observer),
            Arc::clone(&self.notifier),
        )
    }
}
