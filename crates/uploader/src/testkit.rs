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

//! Scripted transports and payload builders shared by unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};

use crate::{
    source::BytesContent,
    transport::{CallResponse, FormField, Method, Transport, TransportFailure, UploadCall},
};

/// Build an in-memory [`Entry`](crate::types::Entry) for tests.
pub fn entry_with_bytes(path: &str, data: &[u8]) -> crate::types::Entry {
    crate::types::Entry {
        content:       Arc::new(BytesContent::from(data.to_vec())),
        relative_path: path.to_string(),
        content_type:  "application/octet-stream".to_string(),
        size:          data.len() as u64,
    }
}

/// Query parameters of a URL as a map.
pub fn parse_query(url: &str) -> HashMap<String, String> {
    reqwest::Url::parse(url)
        .map(|parsed| {
            parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// One call as seen by a fake transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url:    String,
    pub texts:  HashMap<String, String>,
    pub files:  Vec<(String, String, Vec<u8>)>,
}

impl RecordedCall {
    pub fn query(&self, name: &str) -> Option<String> {
        parse_query(&self.url).get(name).cloned()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }
}

fn record(call: &UploadCall) -> RecordedCall {
    let mut texts = HashMap::new();
    let mut files = Vec::new();
    if let Some(form) = &call.form {
        for field in &form.fields {
            match field {
                FormField::Text { name, value } => {
                    texts.insert(name.clone(), value.clone());
                }
                FormField::File {
                    name, file_name, data, ..
                } => files.push((name.clone(), file_name.clone(), data.to_vec())),
            }
        }
    }
    RecordedCall {
        method: call.method,
        url: call.url.clone(),
        texts,
        files,
    }
}

type ScriptedHandler = Box<dyn Fn(&RecordedCall) -> (u16, Vec<u8>) + Send + Sync>;

enum Behavior {
    Scripted(ScriptedHandler),
    Server(ServerBehavior),
}

struct ServerBehavior {
    upload_id:       String,
    chunk_delay:     Option<Duration>,
    failing_chunk:   Option<usize>,
    deferred_polls:  Option<usize>,
    remaining_polls: Mutex<usize>,
    poll_status:     Option<Value>,
    merged_name:     Mutex<Option<String>>,
}

/// A transport that plays an upload server from a script, recording every
/// call and the peak number of concurrent chunk requests.
pub struct FakeTransport {
    behavior:       Behavior,
    calls:          Mutex<Vec<RecordedCall>>,
    current_chunks: AtomicUsize,
    max_chunks:     AtomicUsize,
}

impl FakeTransport {
    /// A custom handler mapping each recorded call to `(status, body)`.
    pub fn scripted(
        handler: impl Fn(&RecordedCall) -> (u16, Vec<u8>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            behavior:       Behavior::Scripted(Box::new(handler)),
            calls:          Mutex::new(Vec::new()),
            current_chunks: AtomicUsize::new(0),
            max_chunks:     AtomicUsize::new(0),
        }
    }

    /// A compliant upload server issuing the given session id.
    pub fn ok_server(upload_id: &str) -> Self {
        Self {
            behavior:       Behavior::Server(ServerBehavior {
                upload_id:       upload_id.to_string(),
                chunk_delay:     None,
                failing_chunk:   None,
                deferred_polls:  None,
                remaining_polls: Mutex::new(0),
                poll_status:     None,
                merged_name:     Mutex::new(None),
            }),
            calls:          Mutex::new(Vec::new()),
            current_chunks: AtomicUsize::new(0),
            max_chunks:     AtomicUsize::new(0),
        }
    }

    /// Hold each chunk request open for `delay` before acknowledging.
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        if let Behavior::Server(server) = &mut self.behavior {
            server.chunk_delay = Some(delay);
        }
        self
    }

    /// Reject the chunk with the given index.
    #[must_use]
    pub fn failing_chunk(mut self, index: usize) -> Self {
        if let Behavior::Server(server) = &mut self.behavior {
            server.failing_chunk = Some(index);
        }
        self
    }

    /// Answer the merge request with a deferred status; the status endpoint
    /// reports pending for `polls` checks before succeeding.
    #[must_use]
    pub fn deferring_merge(mut self, polls: usize) -> Self {
        if let Behavior::Server(server) = &mut self.behavior {
            server.deferred_polls = Some(polls);
            *server.remaining_polls.lock().unwrap() = polls;
        }
        self
    }

    /// Pin the status endpoint to a fixed response body.
    #[must_use]
    pub fn with_poll_status(mut self, status: Value) -> Self {
        if let Behavior::Server(server) = &mut self.behavior {
            server.poll_status = Some(status);
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> { self.calls.lock().unwrap().clone() }

    /// Peak simultaneous chunk requests observed.
    pub fn max_concurrent(&self) -> usize { self.max_chunks.load(Ordering::SeqCst) }

    async fn serve(&self, server: &ServerBehavior, call: &RecordedCall) -> (u16, Vec<u8>) {
        let query = parse_query(&call.url);
        let flag = |name: &str| query.get(name).map(String::as_str) == Some("true");

        if flag("initChunked") {
            return (
                200,
                json!({"uploadId": server.upload_id}).to_string().into_bytes(),
            );
        }

        if flag("statusCheck") {
            if let Some(fixed) = &server.poll_status {
                return (200, fixed.to_string().into_bytes());
            }
            let mut remaining = server.remaining_polls.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return (200, json!({"status": "processing"}).to_string().into_bytes());
            }
            let name = server.merged_name.lock().unwrap().clone().unwrap_or_default();
            return (
                200,
                json!({"status": "success", "result": [{"src": format!("/files/{name}")}]})
                    .to_string()
                    .into_bytes(),
            );
        }

        if flag("chunked") && flag("merge") {
            let name = call.text("originalFileName").unwrap_or_default().to_string();
            *server.merged_name.lock().unwrap() = Some(name.clone());
            if server.deferred_polls.is_some() {
                return (200, json!({"status": "processing"}).to_string().into_bytes());
            }
            return (
                200,
                json!([{"src": format!("/files/{name}")}]).to_string().into_bytes(),
            );
        }

        if flag("chunked") {
            let index: usize = call.text("chunkIndex").and_then(|v| v.parse().ok()).unwrap_or(0);
            if server.failing_chunk == Some(index) {
                return (500, b"chunk handler exploded".to_vec());
            }

            self.current_chunks.fetch_add(1, Ordering::SeqCst);
            self.max_chunks
                .fetch_max(self.current_chunks.load(Ordering::SeqCst), Ordering::SeqCst);
            if let Some(delay) = server.chunk_delay {
                tokio::time::sleep(delay).await;
            }
            self.current_chunks.fetch_sub(1, Ordering::SeqCst);

            return (200, json!({"ok": true}).to_string().into_bytes());
        }

        // Direct upload.
        let name = call
            .files
            .first()
            .map(|(_, file_name, _)| file_name.clone())
            .unwrap_or_default();
        (
            200,
            json!([{"src": format!("/files/{name}")}]).to_string().into_bytes(),
        )
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, call: UploadCall) -> Result<CallResponse, TransportFailure> {
        let recorded = record(&call);
        self.calls.lock().unwrap().push(recorded.clone());

        let (status, body) = match &self.behavior {
            Behavior::Scripted(handler) => handler(&recorded),
            Behavior::Server(server) => self.serve(server, &recorded).await,
        };
        Ok(CallResponse {
            status,
            body: Bytes::from(body),
        })
    }
}
