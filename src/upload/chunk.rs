//! Per-chunk transfer state machine
//!
//! A [`ChunkTransfer`] owns one byte range of the source. It issues one
//! attempt at a time on a spawned task, retries failed attempts immediately
//! until its budget is spent, and turns transport outcomes into
//! [`ChunkEvent`]s for the coordinator.
//!
//! ```text
//! Idle --start--> Running --2xx--> Succeeded
//!                   |  ^
//!          error    |  | retry (attempts < max_attempts)
//!                   v  |
//!                 (error) --budget spent--> Failed
//! ```
//!
//! `stop()` returns any non-terminal chunk to `Idle`.

use super::event::ChunkEvent;
use super::split::ChunkRange;
use super::AttemptError;
use crate::metrics;
use crate::transport::{
    ChunkRequest, ProgressReporter, TransferProgress, Transport, TransportError, TransportResponse,
};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Header carrying the byte range of a chunk
pub const CONTENT_RANGE_HEADER: &str = "Content-Range";

/// Header correlating every chunk of one upload
pub const UPLOAD_ID_HEADER: &str = "X-Unique-Upload-Id";

/// Chunk lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Message posted by an attempt task back to the session task
#[derive(Debug)]
pub(crate) enum Signal {
    Progress {
        index: usize,
        generation: u64,
        progress: TransferProgress,
    },
    Finished {
        index: usize,
        generation: u64,
        result: Result<TransportResponse, TransportError>,
    },
}

/// Everything an attempt needs besides the chunk itself
pub(crate) struct TransferContext {
    pub transport: Arc<dyn Transport>,
    pub signals: mpsc::UnboundedSender<Signal>,
    pub method: String,
    pub url: String,
    pub session_id: String,
    pub total_bytes: u64,
    pub file_name: String,
    pub content_type: Option<String>,
    pub params: Arc<BTreeMap<String, String>>,
}

/// One byte range and its transfer state
#[derive(Debug)]
pub struct ChunkTransfer {
    range: ChunkRange,
    body: Bytes,
    max_attempts: u32,
    attempts: u32,
    succeeded: bool,
    failed: bool,
    stopped: bool,
    /// Progress of the current attempt only
    progress: Option<TransferProgress>,
    /// Some attempt has reported progress
    begun: bool,
    /// Bumped per attempt; signals from older attempts are ignored
    generation: u64,
    in_flight: Option<AbortHandle>,
    /// Generation whose attempt was refunded by `stop`
    refunded: Option<u64>,
}

impl ChunkTransfer {
    pub fn new(range: ChunkRange, body: Bytes, max_attempts: u32) -> Self {
        Self {
            range,
            body,
            max_attempts,
            attempts: 0,
            succeeded: false,
            failed: false,
            stopped: true,
            progress: None,
            begun: false,
            generation: 0,
            in_flight: None,
            refunded: None,
        }
    }

    pub fn index(&self) -> usize {
        self.range.index
    }

    pub fn range(&self) -> &ChunkRange {
        &self.range
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_progress(&self) -> Option<TransferProgress> {
        self.progress
    }

    pub fn status(&self) -> ChunkStatus {
        if self.failed {
            ChunkStatus::Failed
        } else if self.succeeded {
            ChunkStatus::Succeeded
        } else if !self.stopped {
            ChunkStatus::Running
        } else {
            ChunkStatus::Idle
        }
    }

    /// Eligible to be started. A stopped chunk whose last attempt already
    /// finished waits until that outcome is applied.
    pub fn ready(&self) -> bool {
        !self.succeeded && !self.failed && self.stopped && self.in_flight.is_none()
    }

    pub fn running(&self) -> bool {
        !self.stopped
    }

    pub fn done(&self) -> bool {
        self.succeeded || self.failed
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// At least one byte of this chunk has been put on the wire
    pub fn has_begun(&self) -> bool {
        self.succeeded || self.begun
    }

    /// Bytes this chunk contributes to aggregate progress
    pub fn bytes_transferred(&self) -> u64 {
        if self.succeeded {
            return self.range.len();
        }
        if self.failed || self.stopped {
            return 0;
        }
        match self.progress {
            Some(p) if p.length_computable => u64::min(p.loaded, self.range.len()),
            _ => 0,
        }
    }

    /// Headers sent with every attempt of this chunk
    pub fn headers(&self, session_id: &str, total_bytes: u64) -> Vec<(String, String)> {
        vec![
            (
                CONTENT_RANGE_HEADER.to_string(),
                self.range.content_range(total_bytes),
            ),
            (UPLOAD_ID_HEADER.to_string(), session_id.to_string()),
        ]
    }

    /// Begin transferring. Callers check [`ready`](Self::ready) first.
    pub(crate) fn start(&mut self, ctx: &TransferContext) {
        debug_assert!(self.ready(), "chunk {} started while not ready", self.index());
        self.stopped = false;
        self.send(ctx);
    }

    /// Stop transferring and abort the in-flight attempt, if any.
    ///
    /// An aborted attempt is not charged against the attempt budget,
    /// unless its outcome turns out to be queued already.
    pub fn stop(&mut self) {
        self.stopped = true;
        match self.in_flight.take() {
            // Outcome is queued; it still counts
            Some(handle) if handle.is_finished() => self.in_flight = Some(handle),
            Some(handle) => {
                handle.abort();
                self.attempts = self.attempts.saturating_sub(1);
                self.refunded = Some(self.generation);
                tracing::debug!(index = self.index(), "Aborted in-flight chunk attempt");
            }
            None => {}
        }
    }

    fn send(&mut self, ctx: &TransferContext) {
        self.attempts += 1;
        self.generation += 1;
        self.progress = None;
        self.refunded = None;

        let index = self.index();
        let generation = self.generation;

        let request = ChunkRequest {
            method: ctx.method.clone(),
            url: ctx.url.clone(),
            headers: self.headers(&ctx.session_id, ctx.total_bytes),
            body: self.body.clone(),
            file_name: ctx.file_name.clone(),
            content_type: ctx.content_type.clone(),
            fields: ctx.params.clone(),
        };

        let progress_signals = ctx.signals.clone();
        let reporter = ProgressReporter::new(move |progress| {
            let _ = progress_signals.send(Signal::Progress {
                index,
                generation,
                progress,
            });
        });

        tracing::debug!(
            index = index,
            attempt = self.attempts,
            content_range = %self.range.content_range(ctx.total_bytes),
            "Sending chunk"
        );

        let transport = ctx.transport.clone();
        let signals = ctx.signals.clone();
        let task = tokio::spawn(async move {
            let result = transport.send(request, reporter).await;
            let _ = signals.send(Signal::Finished {
                index,
                generation,
                result,
            });
        });

        self.in_flight = Some(task.abort_handle());
    }

    /// Apply a progress update from the attempt task
    pub(crate) fn on_progress(
        &mut self,
        generation: u64,
        progress: TransferProgress,
    ) -> Option<ChunkEvent> {
        if generation != self.generation || self.done() {
            return None;
        }
        self.progress = Some(progress);
        self.begun = true;
        Some(ChunkEvent::Progress(progress))
    }

    /// Apply the outcome of an attempt. May issue a retry.
    pub(crate) fn on_finished(
        &mut self,
        generation: u64,
        result: Result<TransportResponse, TransportError>,
        ctx: &TransferContext,
    ) -> Vec<ChunkEvent> {
        if generation != self.generation || self.done() {
            return Vec::new();
        }
        self.in_flight = None;
        self.progress = None;

        // The attempt ran to completion after all
        if self.refunded.take() == Some(generation) {
            self.attempts += 1;
        }

        let error = match result {
            Ok(response) if response.is_success() => {
                metrics::record_attempt("success");
                metrics::record_chunk_bytes(self.range.len());
                tracing::debug!(
                    index = self.index(),
                    attempt = self.attempts,
                    status = response.status,
                    "Chunk accepted"
                );
                self.succeeded = true;
                self.stopped = true;
                return vec![ChunkEvent::Success(response), ChunkEvent::Complete];
            }
            Ok(response) => AttemptError::Status(response),
            Err(e) => AttemptError::Transport(e),
        };

        metrics::record_attempt("error");
        tracing::warn!(
            index = self.index(),
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            error = %error,
            "Chunk attempt failed"
        );

        let mut events = vec![ChunkEvent::AttemptError {
            attempt: self.attempts,
            error: error.clone(),
        }];
        self.retry(error, ctx, &mut events);
        events
    }

    fn retry(&mut self, error: AttemptError, ctx: &TransferContext, events: &mut Vec<ChunkEvent>) {
        if self.attempts < self.max_attempts {
            // A stopped chunk keeps its remaining budget for resume
            if !self.stopped {
                metrics::record_retry();
                self.send(ctx);
            }
            return;
        }

        metrics::record_chunk_failure();
        tracing::error!(
            index = self.index(),
            attempts = self.attempts,
            error = %error,
            "Chunk failed permanently"
        );
        self.failed = true;
        self.stopped = true;
        events.push(ChunkEvent::PermanentFailure {
            attempts: self.attempts,
            error,
        });
        events.push(ChunkEvent::Complete);
    }
}
