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

use snafu::{ResultExt, ensure};

use crate::{
    config::UploaderConfig,
    error::{EntryReadSnafu, HttpSnafu, NetworkSnafu, ProtocolSnafu, Stage, UploadError},
    transport::{FormBody, Transport, UploadCall},
    types::{Entry, MergeOutcome},
};

/// Single-request transfer for files at or under the chunk threshold.
pub struct DirectUploader {
    transport: Arc<dyn Transport>,
    config:    UploaderConfig,
}

impl DirectUploader {
    pub fn new(transport: Arc<dyn Transport>, config: UploaderConfig) -> Self {
        Self { transport, config }
    }

    /// Upload the whole entry in one request. The file part is named with the
    /// full relative path so the server can derive the storage path from it.
    pub async fn upload(&self, entry: &Entry) -> Result<MergeOutcome, UploadError> {
        let data = entry
            .content
            .read_all()
            .await
            .context(EntryReadSnafu {
                path: entry.relative_path.clone(),
            })?;

        let mut url = self.config.upload_url()?;
        if let Some(compress) = &self.config.server_compress {
            url.query_pairs_mut().append_pair("serverCompress", compress);
        }
        if let Some(name_type) = &self.config.upload_name_type {
            url.query_pairs_mut().append_pair("uploadNameType", name_type);
        }
        if let Some(retry) = &self.config.auto_retry {
            url.query_pairs_mut().append_pair("autoRetry", retry);
        }
        if let Some(folder) = self.config.effective_folder(entry.folder_path()) {
            url.query_pairs_mut().append_pair("uploadFolder", folder);
        }
        self.config.append_common_params(&mut url);

        let form = FormBody::new().file(
            "file",
            entry.relative_path.clone(),
            entry.content_type.clone(),
            data,
        );

        let response = self
            .transport
            .execute(UploadCall::post(url, form).headers(self.config.auth_headers()))
            .await
            .context(NetworkSnafu {
                stage: Stage::Direct,
            })?;

        ensure!(
            response.is_success(),
            HttpSnafu {
                stage:  Stage::Direct,
                status: response.status,
                body:   response.body_text(),
            }
        );

        let value = response.json().map_err(|e| {
            ProtocolSnafu {
                stage:  Stage::Direct,
                detail: e.to_string(),
            }
            .build()
        })?;
        Ok(MergeOutcome::from_value(value))
    }
}
