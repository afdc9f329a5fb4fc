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

use std::{io, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

/// What a drop-payload handle resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Anything else the platform reports; ignored by the enumerator.
    Other,
}

/// An opaque readable byte source with a known length.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Read up to `len` bytes starting at `start`. The result is shorter than
    /// `len` only when the range extends past the end of the source.
    async fn read_range(&self, start: u64, len: usize) -> io::Result<Bytes>;

    async fn read_all(&self) -> io::Result<Bytes> {
        let len = usize::try_from(self.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "source too large"))?;
        self.read_range(0, len).await
    }
}

/// In-memory content, used by the interception layer and tests.
#[derive(Debug, Clone)]
pub struct BytesContent {
    data: Bytes,
}

impl BytesContent {
    #[must_use]
    pub const fn new(data: Bytes) -> Self { Self { data } }

    #[must_use]
    pub const fn from_static(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
        }
    }
}

impl From<Vec<u8>> for BytesContent {
    fn from(data: Vec<u8>) -> Self { Self::new(Bytes::from(data)) }
}

#[async_trait]
impl ContentSource for BytesContent {
    fn len(&self) -> u64 { self.data.len() as u64 }

    async fn read_range(&self, start: u64, len: usize) -> io::Result<Bytes> {
        let total = self.data.len();
        let start = usize::try_from(start).unwrap_or(total).min(total);
        let end = start.saturating_add(len).min(total);
        Ok(self.data.slice(start..end))
    }
}

/// One node of a drop payload: a file, a directory, or something the
/// enumerator should ignore.
#[async_trait]
pub trait DropEntry: Send + Sync {
    /// Base name of this node (no path separators).
    fn name(&self) -> String;

    fn kind(&self) -> EntryKind;

    /// Declared content type, when the source knows one.
    fn content_type(&self) -> Option<String> { None }

    /// Resolve a file handle to its content. Errors are reported by the
    /// enumerator as skips, never as batch failures.
    async fn open(&self) -> io::Result<Arc<dyn ContentSource>>;

    /// Begin reading a directory's children.
    fn read_dir(&self) -> io::Result<Box<dyn DirectoryReader>>;
}

/// Paginated directory listing. A directory's children may be delivered
/// across multiple reads; an empty batch means the listing is exhausted.
#[async_trait]
pub trait DirectoryReader: Send {
    async fn next_batch(&mut self) -> io::Result<Vec<Box<dyn DropEntry>>>;
}
