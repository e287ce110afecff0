//! Upload coordinator
//!
//! [`ChunkedUploader`] validates the configuration, splits the source into
//! [`ChunkTransfer`]s and hands them to a session task. The session task is
//! the only place chunk state changes: attempt tasks post [`Signal`]s, the
//! session applies them, notifies listeners and re-runs the scheduler.
//!
//! # Scheduling
//!
//! - At most `max_simultaneous` chunks run at once.
//! - No chunk other than the first starts before the first chunk has put
//!   bytes on the wire.
//! - With more than two chunks, the terminal chunk starts only after every
//!   other chunk succeeded, so the finalizing request reaches the endpoint
//!   last.
//!
//! # Example
//!
//! ```no_run
//! use chunkr::config::UploadConfig;
//! use chunkr::upload::{Blob, ChunkedUploader, UploadEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let blob = Blob::from_path("movie.mp4").await?;
//! let mut uploader = ChunkedUploader::new(blob, UploadConfig::new("https://example.com/upload"));
//! uploader.on_event(|event| {
//!     if let UploadEvent::Progress(p) = event {
//!         println!("{:.1}%", p.fraction * 100.0);
//!     }
//! });
//!
//! let success = uploader.start()?.await?;
//! println!("Uploaded {} bytes", success.total_bytes);
//! # Ok(())
//! # }
//! ```

use super::chunk::{ChunkTransfer, Signal, TransferContext};
use super::event::{ChunkEvent, EventListener, SessionProgress, UploadEvent};
use super::source::UploadSource;
use super::split::split_ranges;
use super::{AttemptError, UploadError, UploadSuccess};
use crate::config::UploadConfig;
use crate::metrics;
use crate::transport::{HttpTransport, Transport, TransportResponse};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Settled state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
enum Command {
    Stop,
    Resume,
}

/// Entry point for one chunked upload
pub struct ChunkedUploader {
    source: Arc<dyn UploadSource>,
    config: UploadConfig,
    session_id: String,
    transport: Option<Arc<dyn Transport>>,
    listeners: Vec<EventListener>,
}

impl ChunkedUploader {
    /// Create an uploader. A session id is generated unless configured.
    pub fn new(source: impl UploadSource, config: UploadConfig) -> Self {
        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            source: Arc::new(source),
            config,
            session_id,
            transport: None,
            listeners: Vec::new(),
        }
    }

    /// Use `transport` instead of the default [`HttpTransport`]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register a listener for session and chunk events
    pub fn on_event<F>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(&UploadEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate, split and begin scheduling.
    ///
    /// Configuration problems are reported here, before any request is
    /// sent. Must be called from within a tokio runtime.
    pub fn start(self) -> Result<UploadHandle, UploadError> {
        self.config.validate()?;

        if !self.source.supports_slicing() {
            return Err(UploadError::SlicingUnsupported);
        }
        if self.source.is_empty() {
            return Err(UploadError::EmptySource);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.timeout())?),
        };

        let total_bytes = self.source.len();
        let chunks: Vec<ChunkTransfer> = split_ranges(total_bytes, self.config.max_chunk_size)
            .into_iter()
            .map(|range| {
                let body = self.source.slice(range.start..range.end);
                ChunkTransfer::new(range, body, self.config.max_attempts)
            })
            .collect();

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = oneshot::channel();

        let ctx = TransferContext {
            transport,
            signals: signal_tx,
            method: self.config.method.to_ascii_uppercase(),
            // validate() guarantees the url is present
            url: self.config.url.clone().unwrap_or_default(),
            session_id: self.session_id.clone(),
            total_bytes,
            file_name: self.source.file_name().to_string(),
            content_type: self.source.content_type().map(str::to_string),
            params: Arc::new(self.config.params.clone()),
        };

        tracing::info!(
            session_id = %self.session_id,
            total_bytes = total_bytes,
            chunks = chunks.len(),
            max_chunk_size = self.config.max_chunk_size,
            max_simultaneous = self.config.max_simultaneous,
            "Starting chunked upload"
        );

        let mut session = UploadSession {
            chunks,
            ctx,
            concurrency_limit: self.config.max_simultaneous,
            stopped: false,
            outcome: SessionOutcome::Pending,
            completion: Some(completion_tx),
            listeners: self.listeners,
            started_at: Instant::now(),
        };
        session.tick();

        tokio::spawn(session.run(signal_rx, command_rx));

        Ok(UploadHandle {
            controller: UploadController {
                commands: command_tx,
                session_id: Arc::from(self.session_id.as_str()),
            },
            completion: completion_rx,
        })
    }
}

/// Cloneable remote control for a running session
#[derive(Debug, Clone)]
pub struct UploadController {
    commands: mpsc::UnboundedSender<Command>,
    session_id: Arc<str>,
}

impl UploadController {
    /// Pause the session and abort running chunks.
    ///
    /// Does not settle the upload; [`resume`](Self::resume) continues it.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Continue a stopped session
    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Single-shot completion of an upload, returned by
/// [`ChunkedUploader::start`]
///
/// Resolves once with the session outcome. A stopped session stays
/// unresolved until it is resumed and finishes.
#[derive(Debug)]
pub struct UploadHandle {
    controller: UploadController,
    completion: oneshot::Receiver<Result<UploadSuccess, UploadError>>,
}

impl UploadHandle {
    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn resume(&self) {
        self.controller.resume();
    }

    pub fn controller(&self) -> UploadController {
        self.controller.clone()
    }

    pub fn session_id(&self) -> &str {
        self.controller.session_id()
    }
}

impl Future for UploadHandle {
    type Output = Result<UploadSuccess, UploadError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().completion)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(UploadError::Interrupted)))
    }
}

/// State owned by the session task
struct UploadSession {
    chunks: Vec<ChunkTransfer>,
    ctx: TransferContext,
    concurrency_limit: usize,
    stopped: bool,
    outcome: SessionOutcome,
    completion: Option<oneshot::Sender<Result<UploadSuccess, UploadError>>>,
    listeners: Vec<EventListener>,
    started_at: Instant,
}

impl UploadSession {
    async fn run(
        mut self,
        mut signals: mpsc::UnboundedReceiver<Signal>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut commands_open = true;

        while self.outcome == SessionOutcome::Pending {
            tokio::select! {
                Some(signal) = signals.recv() => self.handle_signal(signal),
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Stop) => self.stop(),
                    Some(Command::Resume) => self.resume(),
                    None => commands_open = false,
                },
                else => break,
            }

            // Paused with nobody left to resume it
            if self.stopped && !commands_open {
                tracing::info!(session_id = %self.ctx.session_id, "Abandoning stopped upload");
                break;
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Progress {
                index,
                generation,
                progress,
            } => {
                if let Some(event) = self.chunks[index].on_progress(generation, progress) {
                    self.on_chunk_event(index, event);
                }
            }
            Signal::Finished {
                index,
                generation,
                result,
            } => {
                let events = self.chunks[index].on_finished(generation, result, &self.ctx);
                for event in events {
                    self.on_chunk_event(index, event);
                }
            }
        }

        self.tick();
    }

    fn on_chunk_event(&mut self, index: usize, event: ChunkEvent) {
        self.emit(UploadEvent::Chunk {
            index,
            event: event.clone(),
        });

        match event {
            ChunkEvent::Progress(_) => self.emit_progress(),
            ChunkEvent::AttemptError { .. } => {}
            ChunkEvent::PermanentFailure { attempts, error } => self.fail(index, attempts, error),
            ChunkEvent::Success(response) => {
                self.emit_progress();
                if self.count_succeeded() == self.chunks.len() {
                    self.succeed(response);
                }
            }
            ChunkEvent::Complete => self.emit_progress(),
        }
    }

    /// Start every chunk that may run now
    fn tick(&mut self) {
        if self.stopped || self.outcome != SessionOutcome::Pending {
            return;
        }

        let mut running = self.count_running();
        let mut cur = 0;
        while running < self.concurrency_limit && cur < self.chunks.len() {
            if self.ready_for_chunk(cur) {
                self.chunks[cur].start(&self.ctx);
            }
            running = self.count_running();
            cur += 1;
        }
    }

    fn ready_for_chunk(&self, cur: usize) -> bool {
        let chunk = &self.chunks[cur];
        if !chunk.ready() {
            return false;
        }

        if cur != 0 && !self.chunks[0].has_begun() {
            return false;
        }

        let count = self.chunks.len();
        if count > 2 && chunk.range().is_terminal {
            return self.chunks[..count - 1].iter().all(|c| c.succeeded());
        }

        true
    }

    fn count_running(&self) -> usize {
        self.chunks.iter().filter(|c| c.running()).count()
    }

    fn count_succeeded(&self) -> usize {
        self.chunks.iter().filter(|c| c.succeeded()).count()
    }

    fn bytes_transferred(&self) -> u64 {
        self.chunks.iter().map(|c| c.bytes_transferred()).sum()
    }

    fn stop(&mut self) {
        self.stopped = true;
        for chunk in self.chunks.iter_mut().filter(|c| c.running()) {
            chunk.stop();
        }
        tracing::info!(session_id = %self.ctx.session_id, "Upload stopped");
    }

    fn resume(&mut self) {
        if !self.stopped || self.outcome != SessionOutcome::Pending {
            return;
        }
        self.stopped = false;
        tracing::info!(session_id = %self.ctx.session_id, "Upload resumed");
        self.tick();
    }

    fn succeed(&mut self, response: TransportResponse) {
        if self.outcome != SessionOutcome::Pending {
            return;
        }
        self.outcome = SessionOutcome::Succeeded;

        let elapsed = self.started_at.elapsed();
        metrics::record_session("success", elapsed.as_secs_f64());
        tracing::info!(
            session_id = %self.ctx.session_id,
            total_bytes = self.ctx.total_bytes,
            chunks = self.chunks.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Chunked upload completed"
        );

        let success = UploadSuccess {
            session_id: self.ctx.session_id.clone(),
            total_bytes: self.ctx.total_bytes,
            chunk_count: self.chunks.len(),
            response,
        };
        self.emit(UploadEvent::Success(success.clone()));
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(Ok(success));
        }
    }

    fn fail(&mut self, index: usize, attempts: u32, error: AttemptError) {
        if self.outcome != SessionOutcome::Pending {
            return;
        }
        self.stop();
        self.outcome = SessionOutcome::Failed;

        metrics::record_session("failure", self.started_at.elapsed().as_secs_f64());
        tracing::error!(
            session_id = %self.ctx.session_id,
            index = index,
            attempts = attempts,
            error = %error,
            "Chunked upload failed"
        );

        self.emit(UploadEvent::Failure {
            index,
            attempts,
            error: error.clone(),
        });
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(Err(UploadError::ChunkFailed {
                index,
                attempts,
                error,
            }));
        }
    }

    fn emit_progress(&self) {
        if self.outcome != SessionOutcome::Pending {
            return;
        }
        let progress = SessionProgress::new(self.bytes_transferred(), self.ctx.total_bytes);
        self.emit(UploadEvent::Progress(progress));
    }

    fn emit(&self, event: UploadEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }
}
