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

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use snafu::Snafu;
use strum_macros::Display;

use crate::config::UploaderConfig;

/// Error surfaced by a transport when no HTTP response was produced.
#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct TransportFailure {
    pub message: String,
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// One field of a multipart form body.
#[derive(Debug, Clone)]
pub enum FormField {
    Text {
        name:  String,
        value: String,
    },
    File {
        name:         String,
        file_name:    String,
        content_type: String,
        data:         Bytes,
    },
}

/// A multipart form body under construction.
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    pub fields: Vec<FormField>,
}

impl FormBody {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::Text {
            name:  name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> Self {
        self.fields.push(FormField::File {
            name: name.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        });
        self
    }

    /// The file fields of this form.
    pub fn file_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields
            .iter()
            .filter(|field| matches!(field, FormField::File { .. }))
    }
}

/// One outgoing call to the upload server.
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub method:  Method,
    pub url:     String,
    pub headers: Vec<(String, String)>,
    pub form:    Option<FormBody>,
}

impl UploadCall {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method:  Method::Get,
            url:     url.into(),
            headers: Vec::new(),
            form:    None,
        }
    }

    #[must_use]
    pub fn post(url: impl Into<String>, form: FormBody) -> Self {
        Self {
            method:  Method::Post,
            url:     url.into(),
            headers: Vec::new(),
            form:    Some(form),
        }
    }

    #[must_use]
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

/// The raw result of an executed call.
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub status: u16,
    pub body:   Bytes,
}

impl CallResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool { self.status >= 200 && self.status < 300 }

    #[must_use]
    pub fn body_text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// The seam every protocol call goes through. Production code uses
/// [`HttpTransport`]; tests substitute scripted implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, call: UploadCall) -> Result<CallResponse, TransportFailure>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the HTTP client for the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client fails to build (should never happen with
    /// valid config).
    #[must_use]
    pub fn new(config: &UploaderConfig) -> Self {
        let timeout: std::time::Duration = config
            .timeout
            .try_into()
            .expect("timeout must be non-negative");

        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        Self {
            client: builder.build().expect("Failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, call: UploadCall) -> Result<CallResponse, TransportFailure> {
        let mut request = match call.method {
            Method::Get => self.client.get(&call.url),
            Method::Post => self.client.post(&call.url),
        };

        for (name, value) in &call.headers {
            request = request.header(name, value);
        }

        if let Some(form) = call.form {
            let mut multipart = reqwest::multipart::Form::new();
            for field in form.fields {
                match field {
                    FormField::Text { name, value } => {
                        multipart = multipart.text(name, value);
                    }
                    FormField::File {
                        name,
                        file_name,
                        content_type,
                        data,
                    } => {
                        let part = reqwest::multipart::Part::bytes(data.to_vec())
                            .file_name(file_name)
                            .mime_str(&content_type)?;
                        multipart = multipart.part(name, part);
                    }
                }
            }
            request = request.multipart(multipart);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(CallResponse { status, body })
    }
}
