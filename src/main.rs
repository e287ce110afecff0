//! Chunkr - chunked HTTP uploader
//!
//! Uploads one file to an endpoint that accepts `Content-Range` chunks.

use anyhow::{bail, Context};
use chunkr::config::{Config, LogFormat};
use chunkr::upload::{ChunkEvent, UploadEvent};
use chunkr::{Blob, ChunkedUploader};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Chunkr - resumable chunked uploads over HTTP
#[derive(Parser, Debug)]
#[command(name = "chunkr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to upload
    file: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Destination URL (overrides upload.url)
    #[arg(short, long)]
    url: Option<String>,

    /// HTTP method for chunk requests
    #[arg(short, long)]
    method: Option<String>,

    /// Maximum bytes per chunk
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Maximum chunks in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Attempts per chunk before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Upload session id (X-Unique-Upload-Id)
    #[arg(long)]
    session_id: Option<String>,

    /// Extra form field sent with every chunk, as KEY=VALUE
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Content type of the uploaded file part
    #[arg(long)]
    content_type: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    print_metrics: bool,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

impl Args {
    fn apply(&self, config: &mut Config) {
        let upload = &mut config.upload;
        if let Some(url) = &self.url {
            upload.url = Some(url.clone());
        }
        if let Some(method) = &self.method {
            upload.method = method.clone();
        }
        if let Some(size) = self.chunk_size {
            upload.max_chunk_size = size;
        }
        if let Some(concurrency) = self.concurrency {
            upload.max_simultaneous = concurrency;
        }
        if let Some(attempts) = self.max_attempts {
            upload.max_attempts = attempts;
        }
        if let Some(session_id) = &self.session_id {
            upload.session_id = Some(session_id.clone());
        }
        upload.params.extend(self.params.iter().cloned());

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    chunkr::logging::init_subscriber(&config.logging)?;
    info!("Starting chunkr v{}", chunkr::VERSION);

    let mut blob = Blob::from_path(&args.file)
        .await
        .with_context(|| format!("Failed to read {:?}", args.file))?;
    if let Some(content_type) = &args.content_type {
        blob = blob.with_content_type(content_type);
    }

    let mut uploader = ChunkedUploader::new(blob, config.upload);
    uploader.on_event(|event| match event {
        UploadEvent::Progress(p) => {
            info!(loaded = p.loaded, total = p.total, "{:.1}%", p.fraction * 100.0)
        }
        UploadEvent::Chunk {
            index,
            event: ChunkEvent::AttemptError { attempt, error },
        } => warn!(index = *index, attempt = *attempt, error = %error, "Chunk attempt failed"),
        _ => {}
    });

    let mut handle = uploader.start()?;
    let controller = handle.controller();

    let result = tokio::select! {
        result = &mut handle => result,
        _ = tokio::signal::ctrl_c() => {
            warn!(session_id = controller.session_id(), "Interrupted, stopping upload");
            controller.stop();
            bail!("Upload {} interrupted", controller.session_id());
        }
    };

    if args.print_metrics {
        eprintln!("{}", chunkr::metrics::gather_text()?);
    }

    let success = result?;
    let summary = serde_json::json!({
        "session_id": success.session_id,
        "total_bytes": success.total_bytes,
        "chunks": success.chunk_count,
        "status": success.response.status,
        "response": String::from_utf8_lossy(&success.response.body),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
