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

mod chunked;
mod config;
mod direct;
mod enumerate;
mod error;
mod fs_source;
mod intercept;
mod progress;
mod queue;
mod source;
#[cfg(test)]
pub(crate) mod testkit;
mod transport;
mod types;
mod uploader;

pub use config::{ChunkingConfig, UPLOAD_PATH, UploaderConfig};
pub use enumerate::enumerate;
pub use error::{Stage, UploadError};
pub use fs_source::FsDropEntry;
pub use intercept::InterceptClient;
pub use progress::{
    BatchProgress, BatchSummary, ChunkPhase, FailedUpload, ListingNotifier, LogObserver,
    NullNotifier, NullObserver, ProgressObserver,
};
pub use source::{BytesContent, ContentSource, DirectoryReader, DropEntry, EntryKind};
pub use transport::{
    CallResponse, FormBody, FormField, HttpTransport, Method, Transport, TransportFailure,
    UploadCall,
};
pub use types::{
    ChunkStatus, Entry, MergeOutcome, PollStatus, Session, TransferPlan, TransferStrategy,
    UploadOutcome, UploadedFile,
};
pub use uploader::Uploader;
