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

use jiff::SignedDuration;
use porter_base::readable_size::ReadableSize;
use snafu::Snafu;
use strum_macros::Display;

use crate::{transport::TransportFailure, types::PollStatus};

/// Protocol stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Direct,
    Init,
    Chunk,
    Merge,
    Status,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UploadError {
    #[snafu(display(
        "{path}: file too large: {size} needs {chunk_count} chunks, exceeding the \
         {max_chunks}-chunk cap ({limit} per file)"
    ))]
    TooManyChunks {
        path:        String,
        size:        ReadableSize,
        chunk_count: usize,
        max_chunks:  usize,
        limit:       ReadableSize,
    },

    #[snafu(display("invalid upload endpoint: {url}"))]
    InvalidEndpoint { url: String },

    #[snafu(display("{stage} request did not reach the server: {source}"))]
    Network {
        stage:  Stage,
        source: TransportFailure,
    },

    #[snafu(display("{stage} request failed with HTTP {status}: {body}"))]
    Http {
        stage:  Stage,
        status: u16,
        body:   String,
    },

    #[snafu(display("chunk {index} of {total} failed: {message}"))]
    ChunkFailed {
        index:   usize,
        total:   usize,
        message: String,
    },

    #[snafu(display("session initiation returned no uploadId"))]
    MissingUploadId,

    #[snafu(display("unexpected {stage} response: {detail}"))]
    Protocol { stage: Stage, detail: String },

    #[snafu(display("server reported merge {status}: {detail}"))]
    MergeRejected { status: PollStatus, detail: String },

    #[snafu(display("merge did not complete within {budget:#}"))]
    MergeTimeout { budget: SignedDuration },

    #[snafu(display("failed to read {path}: {source}"))]
    EntryRead {
        path:   String,
        source: std::io::Error,
    },
}
