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

use bon::Builder;
use jiff::SignedDuration;
use porter_base::readable_size::ReadableSize;
use reqwest::Url;
use smart_default::SmartDefault;
use snafu::ensure;

use crate::{
    error::{InvalidEndpointSnafu, TooManyChunksSnafu, UploadError},
    types::{TransferPlan, TransferStrategy},
};

/// Path of the upload endpoint on the configured origin.
pub const UPLOAD_PATH: &str = "/upload";

const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
const DEFAULT_CHANNEL: &str = "telegram";

/// Configuration for file partitioning.
///
/// A single size knob serves as both the direct/chunked threshold (exclusive
/// upper bound for direct) and the partition size.
#[derive(Debug, Clone, SmartDefault)]
pub struct ChunkingConfig {
    /// Size of each chunk; files strictly larger than this are chunked
    /// (default: 20MiB).
    #[default(ReadableSize::mb(20))]
    pub chunk_size: ReadableSize,
    /// Hard cap on chunks per file (default: 200).
    #[default = 200]
    pub max_chunks: usize,
}

impl ChunkingConfig {
    /// Decide the transfer strategy for a file of the given size.
    #[must_use]
    pub const fn strategy(&self, size: u64) -> TransferStrategy {
        if size > self.chunk_size.as_bytes() {
            TransferStrategy::Chunked
        } else {
            TransferStrategy::Direct
        }
    }

    /// Number of chunks a file of the given size partitions into.
    #[must_use]
    pub const fn chunk_count(&self, size: u64) -> usize {
        let count = size.div_ceil(self.chunk_size.as_bytes());
        if count == 0 { 1 } else { count as usize }
    }

    /// The per-file size ceiling implied by the chunk cap.
    #[must_use]
    pub const fn max_file_size(&self) -> ReadableSize {
        ReadableSize(self.chunk_size.as_bytes() * self.max_chunks as u64)
    }

    /// Resolve the transfer plan for one file, or fail validation when the
    /// file would exceed the chunk cap. No network call is made either way.
    pub fn plan(&self, relative_path: &str, size: u64) -> Result<TransferPlan, UploadError> {
        let chunk_count = self.chunk_count(size);
        ensure!(
            chunk_count <= self.max_chunks,
            TooManyChunksSnafu {
                path: relative_path,
                size: ReadableSize(size),
                chunk_count,
                max_chunks: self.max_chunks,
                limit: self.max_file_size(),
            }
        );

        Ok(TransferPlan {
            relative_path: relative_path.to_string(),
            size,
            strategy: self.strategy(size),
            chunk_size: self.chunk_size.as_bytes(),
            chunk_count,
        })
    }
}

/// Configuration for the uploader.
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct UploaderConfig {
    /// Origin of the upload server, e.g. `https://files.example.com`.
    #[default(DEFAULT_ENDPOINT.to_string())]
    #[builder(default = DEFAULT_ENDPOINT.to_string())]
    pub endpoint: String,

    /// Chunking configuration.
    #[default(ChunkingConfig::default())]
    #[builder(default)]
    pub chunking: ChunkingConfig,

    /// Bearer token attached as an `Authorization` header when present.
    pub token: Option<String>,

    /// Access code forwarded both as an `authCode` header and query
    /// parameter.
    pub auth_code: Option<String>,

    /// Upload channel the server routes files through.
    #[default(DEFAULT_CHANNEL.to_string())]
    #[builder(default = DEFAULT_CHANNEL.to_string())]
    pub upload_channel: String,

    /// Target folder for files whose relative path carries no directory
    /// prefix of its own.
    pub upload_folder: Option<String>,

    /// Direct-path passthrough: `serverCompress` query parameter.
    pub server_compress: Option<String>,

    /// Direct-path passthrough: `uploadNameType` query parameter.
    pub upload_name_type: Option<String>,

    /// Direct-path passthrough: `autoRetry` query parameter.
    pub auto_retry: Option<String>,

    /// Timeout for individual HTTP requests.
    #[default(SignedDuration::from_secs(30))]
    #[builder(default = SignedDuration::from_secs(30))]
    pub timeout: SignedDuration,

    /// Delay between merge-status checks.
    #[default(SignedDuration::from_secs(2))]
    #[builder(default = SignedDuration::from_secs(2))]
    pub poll_interval: SignedDuration,

    /// Wall-clock budget for a deferred merge to resolve.
    #[default(SignedDuration::from_secs(300))]
    #[builder(default = SignedDuration::from_secs(300))]
    pub poll_budget: SignedDuration,

    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl UploaderConfig {
    /// The upload endpoint URL without query parameters.
    pub fn upload_url(&self) -> Result<Url, UploadError> {
        Url::parse(&self.endpoint)
            .ok()
            .and_then(|base| base.join(UPLOAD_PATH).ok())
            .ok_or_else(|| {
                InvalidEndpointSnafu {
                    url: self.endpoint.clone(),
                }
                .build()
            })
    }

    /// Headers attached to every upload call.
    #[must_use]
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        if let Some(code) = &self.auth_code {
            headers.push(("authCode".to_string(), code.clone()));
        }
        headers
    }

    /// Append the query parameters every protocol call carries.
    pub(crate) fn append_common_params(&self, url: &mut Url) {
        url.query_pairs_mut()
            .append_pair("uploadChannel", &self.upload_channel);
        if let Some(code) = &self.auth_code {
            url.query_pairs_mut().append_pair("authCode", code);
        }
    }

    /// The folder a file lands in: its own directory prefix when it has one,
    /// the configured target folder otherwise.
    pub(crate) fn effective_folder<'a>(&'a self, folder_path: Option<&'a str>) -> Option<&'a str> {
        folder_path.or(self.upload_folder.as_deref())
    }
}
