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

use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use snafu::{ResultExt, Whatever, whatever};
use tracing_subscriber::EnvFilter;
use uploader::{DropEntry, FsDropEntry, LogObserver, Uploader, UploaderConfig};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "porter",
about = "porter-cmd",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Upload(UploadArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Upload files and folders to an upload server, preserving folder structure.
Files over the chunk threshold are transferred as bounded-size chunks and
merged server-side.

Examples:

porter upload ./docs --endpoint https://files.example.com
porter upload movie.mkv notes.txt --endpoint https://files.example.com --folder inbox

")]
struct UploadArgs {
    /// Files and folders to upload.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Origin of the upload server.
    #[arg(long, env = "PORTER_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    /// Bearer token for the Authorization header.
    #[arg(long, env = "PORTER_TOKEN")]
    token: Option<String>,

    /// Access code forwarded as header and query parameter.
    #[arg(long, env = "PORTER_AUTH_CODE")]
    auth_code: Option<String>,

    /// Upload channel the server routes files through.
    #[arg(long, default_value = "telegram")]
    channel: String,

    /// Target folder for files without a directory prefix of their own.
    #[arg(long)]
    folder: Option<String>,
}

impl UploadArgs {
    async fn run(&self) -> Result<(), Whatever> {
        let config = UploaderConfig {
            endpoint: self.endpoint.clone(),
            token: self.token.clone(),
            auth_code: self.auth_code.clone(),
            upload_channel: self.channel.clone(),
            upload_folder: self.folder.clone(),
            ..UploaderConfig::default()
        };

        let mut roots: Vec<Box<dyn DropEntry>> = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let root = FsDropEntry::new(path)
                .with_whatever_context(|_| format!("cannot read {}", path.display()))?;
            roots.push(Box::new(root));
        }

        let summary = Uploader::new(config)
            .observer(Arc::new(LogObserver))
            .upload_batch(roots)
            .await;

        println!(
            "upload finished: {} succeeded, {} failed",
            summary.success_count, summary.fail_count
        );
        for failure in &summary.failures {
            println!("  {}: {}", failure.path, failure.error);
        }
        if summary.fail_count > 0 {
            whatever!("{} upload(s) failed", summary.fail_count);
        }
        Ok(())
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    init_logging();
    let cli = Cli::parse();
    match cli.commands {
        Commands::Upload(ua) => ua.run().await,
    }
}
