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

use bytes::Bytes;
use reqwest::Url;
use tracing::{debug, info};

use crate::{
    chunked::ChunkedUploader,
    config::{UPLOAD_PATH, UploaderConfig},
    source::BytesContent,
    transport::{CallResponse, FormField, Method, Transport, TransportFailure, UploadCall},
    types::{Entry, MergeOutcome},
};

/// A client wrapper the host sends its upload calls through. Oversized
/// single-file submissions are rerouted through the chunked engine; the host
/// receives a response shaped exactly like a direct upload's. Everything
/// else reaches the wrapped transport untouched.
///
/// Callers opt in by constructing their client through this wrapper; no
/// process-wide request hook is involved.
pub struct InterceptClient {
    transport: Arc<dyn Transport>,
    config:    UploaderConfig,
}

/// An oversized submission lifted out of a host call.
struct Diverted {
    entry:  Entry,
    config: UploaderConfig,
}

impl InterceptClient {
    pub fn new(transport: Arc<dyn Transport>, config: UploaderConfig) -> Self {
        Self { transport, config }
    }

    /// Send one host call.
    pub async fn send(&self, call: UploadCall) -> Result<CallResponse, TransportFailure> {
        match self.divert(&call) {
            Some(diverted) => {
                info!(
                    path = %diverted.entry.relative_path,
                    size = diverted.entry.size,
                    "rerouting oversized upload through the chunked engine"
                );
                Ok(self.reroute(diverted).await)
            }
            None => self.transport.execute(call).await,
        }
    }

    /// Decide whether a call is an oversized plain upload. Requests at or
    /// under the threshold, and requests that are already chunk/init calls,
    /// are left alone.
    fn divert(&self, call: &UploadCall) -> Option<Diverted> {
        if call.method != Method::Post {
            return None;
        }

        let url = Url::parse(&call.url).ok()?;
        if url.path() != UPLOAD_PATH {
            return None;
        }
        let is_true = |name: &str| {
            url.query_pairs()
                .any(|(key, value)| key == name && value == "true")
        };
        if is_true("chunked") || is_true("initChunked") || is_true("statusCheck") {
            return None;
        }

        let form = call.form.as_ref()?;
        let mut files = form.file_fields();
        let file = files.next()?;
        if files.next().is_some() {
            debug!("multi-file submission, leaving to the host transport");
            return None;
        }
        let FormField::File {
            name,
            file_name,
            content_type,
            data,
        } = file
        else {
            return None;
        };
        if name != "file" || data.len() as u64 <= self.config.chunking.chunk_size.as_bytes() {
            return None;
        }

        Some(Diverted {
            entry:  Entry {
                content:       Arc::new(BytesContent::new(data.clone())),
                relative_path: file_name.clone(),
                content_type:  content_type.clone(),
                size:          data.len() as u64,
            },
            config: self.derive_config(&url),
        })
    }

    /// Carry the original call's routing parameters over to the engine.
    fn derive_config(&self, url: &Url) -> UploaderConfig {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        let mut derived = self.config.clone();
        if let Some(origin) = origin_of(url) {
            derived.endpoint = origin;
        }
        if let Some(channel) = param("uploadChannel") {
            derived.upload_channel = channel;
        }
        if let Some(code) = param("authCode") {
            derived.auth_code = Some(code);
        }
        if let Some(folder) = param("uploadFolder") {
            derived.upload_folder = Some(folder);
        }
        derived
    }

    async fn reroute(&self, diverted: Diverted) -> CallResponse {
        let plan = diverted
            .config
            .chunking
            .plan(&diverted.entry.relative_path, diverted.entry.size);

        let outcome = match plan {
            Ok(plan) => {
                let engine =
                    ChunkedUploader::new(Arc::clone(&self.transport), diverted.config);
                engine.upload(&diverted.entry, &plan, &|_| {}).await
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok(result) => synthesize_success(&result),
            Err(error) => CallResponse {
                status: 500,
                body:   Bytes::from(error.to_string()),
            },
        }
    }
}

/// The response the host would have seen from a direct upload.
fn synthesize_success(outcome: &MergeOutcome) -> CallResponse {
    let body = serde_json::to_vec(&outcome.normalized()).unwrap_or_default();
    CallResponse {
        status: 200,
        body:   Bytes::from(body),
    }
}

fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let origin = url.port().map_or_else(
        || format!("{}://{host}", url.scheme()),
        |port| format!("{}://{host}:{port}", url.scheme()),
    );
    Some(origin)
}
