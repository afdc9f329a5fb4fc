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

use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use tracing::{debug, warn};

use crate::{
    source::{DropEntry, EntryKind},
    types::Entry,
};

const OCTET_STREAM: &str = "application/octet-stream";

/// Walk a drop payload into the flat list of files it transitively contains,
/// with paths relative to the drop root.
///
/// Sibling and recursive traversals run concurrently; the result resolves
/// once every spawned traversal has. Unreadable files are skipped with a
/// warning, and handles that are neither file nor directory are ignored.
/// Result ordering is unspecified; the queue imposes its own.
pub async fn enumerate(roots: Vec<Box<dyn DropEntry>>) -> Vec<Entry> {
    let mut traversals: FuturesUnordered<_> = roots
        .into_iter()
        .map(|root| resolve(root, String::new()))
        .collect();

    let mut entries = Vec::new();
    while let Some(found) = traversals.next().await {
        entries.extend(found);
    }
    entries
}

fn resolve(node: Box<dyn DropEntry>, base: String) -> BoxFuture<'static, Vec<Entry>> {
    async move {
        match node.kind() {
            EntryKind::File => resolve_file(node.as_ref(), &base).await,
            EntryKind::Directory => resolve_directory(node.as_ref(), &base).await,
            EntryKind::Other => {
                debug!(name = %node.name(), "ignoring drop handle of unknown kind");
                Vec::new()
            }
        }
    }
    .boxed()
}

async fn resolve_file(node: &dyn DropEntry, base: &str) -> Vec<Entry> {
    let relative_path = join_path(base, &node.name());
    match node.open().await {
        Ok(content) => {
            let size = content.len();
            vec![Entry {
                content,
                relative_path,
                content_type: node.content_type().unwrap_or_else(|| OCTET_STREAM.to_string()),
                size,
            }]
        }
        Err(error) => {
            warn!(path = %relative_path, %error, "skipping unreadable file");
            Vec::new()
        }
    }
}

async fn resolve_directory(node: &dyn DropEntry, base: &str) -> Vec<Entry> {
    let dir_path = join_path(base, &node.name());

    let mut reader = match node.read_dir() {
        Ok(reader) => reader,
        Err(error) => {
            warn!(path = %dir_path, %error, "skipping unreadable directory");
            return Vec::new();
        }
    };

    // A listing may arrive across several reads; only an empty batch means
    // the directory is exhausted.
    let mut children = Vec::new();
    loop {
        match reader.next_batch().await {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => children.extend(batch),
            Err(error) => {
                warn!(path = %dir_path, %error, "directory read failed, keeping entries seen so far");
                break;
            }
        }
    }

    let mut traversals: FuturesUnordered<_> = children
        .into_iter()
        .map(|child| resolve(child, dir_path.clone()))
        .collect();

    let mut entries = Vec::new();
    while let Some(found) = traversals.next().await {
        entries.extend(found);
    }
    entries
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
