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

use std::{
    io::{self, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt},
};

use crate::source::{ContentSource, DirectoryReader, DropEntry, EntryKind};

/// Children returned per directory read.
const READ_DIR_BATCH: usize = 64;

/// A drop-payload node backed by the local filesystem.
pub struct FsDropEntry {
    path: PathBuf,
    kind: EntryKind,
    size: u64,
}

impl FsDropEntry {
    /// Wrap a filesystem path. The node kind is resolved here so the
    /// enumerator can branch without further I/O.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path)?;
        let kind = if metadata.is_file() {
            EntryKind::File
        } else if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        };
        Ok(Self {
            path,
            kind,
            size: metadata.len(),
        })
    }
}

#[async_trait]
impl DropEntry for FsDropEntry {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.to_string_lossy().into_owned(), |name| {
                name.to_string_lossy().into_owned()
            })
    }

    fn kind(&self) -> EntryKind { self.kind }

    fn content_type(&self) -> Option<String> {
        mime_guess::from_path(&self.path)
            .first()
            .map(|mime| mime.to_string())
    }

    async fn open(&self) -> io::Result<Arc<dyn ContentSource>> {
        // Probe readability now so a permission problem surfaces as a skip
        // during enumeration rather than mid-transfer.
        File::open(&self.path).await?;
        Ok(Arc::new(FsContent {
            path: self.path.clone(),
            size: self.size,
        }))
    }

    fn read_dir(&self) -> io::Result<Box<dyn DirectoryReader>> {
        Ok(Box::new(FsDirectoryReader {
            path:   self.path.clone(),
            reader: None,
        }))
    }
}

struct FsDirectoryReader {
    path:   PathBuf,
    reader: Option<fs::ReadDir>,
}

#[async_trait]
impl DirectoryReader for FsDirectoryReader {
    async fn next_batch(&mut self) -> io::Result<Vec<Box<dyn DropEntry>>> {
        if self.reader.is_none() {
            self.reader = Some(fs::read_dir(&self.path).await?);
        }
        let reader = self.reader.as_mut().expect("reader just initialized");

        let mut batch: Vec<Box<dyn DropEntry>> = Vec::new();
        while batch.len() < READ_DIR_BATCH {
            match reader.next_entry().await? {
                Some(entry) => batch.push(Box::new(FsDropEntry::new(entry.path())?)),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// File content read by byte range from disk.
struct FsContent {
    path: PathBuf,
    size: u64,
}

#[async_trait]
impl ContentSource for FsContent {
    fn len(&self) -> u64 { self.size }

    async fn read_range(&self, start: u64, len: usize) -> io::Result<Bytes> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn fs_entry_resolves_kind_and_content() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("hello.txt");
        std::fs::write(&file_path, b"hello porter").unwrap();

        let file = FsDropEntry::new(&file_path).unwrap();
        assert_eq!(file.kind(), EntryKind::File);
        assert_eq!(file.name(), "hello.txt");
        assert_eq!(file.content_type().as_deref(), Some("text/plain"));

        let content = file.open().await.unwrap();
        assert_eq!(content.len(), 12);
        assert_eq!(content.read_all().await.unwrap().as_ref(), b"hello porter");
        assert_eq!(content.read_range(6, 100).await.unwrap().as_ref(), b"porter");

        let root = FsDropEntry::new(dir.path()).unwrap();
        assert_eq!(root.kind(), EntryKind::Directory);
    }

    #[tokio::test]
    async fn fs_directory_reader_pages_until_empty() {
        let dir = TempDir::new().unwrap();
        for i in 0..3 {
            std::fs::write(dir.path().join(format!("f{i}.bin")), b"x").unwrap();
        }

        let root = FsDropEntry::new(dir.path()).unwrap();
        let mut reader = root.read_dir().unwrap();

        let mut names = Vec::new();
        loop {
            let batch = reader.next_batch().await.unwrap();
            if batch.is_empty() {
                break;
            }
            names.extend(batch.iter().map(|e| e.name()));
        }
        names.sort();
        assert_eq!(names, ["f0.bin", "f1.bin", "f2.bin"]);
    }
}
