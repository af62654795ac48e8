//! Marshals provider completions onto the thread that owns the controller.
//!
//! Providers answer from arbitrary threads through a [`ResponseSender`]. The
//! session drains the paired [`ResponseQueue`] on its own thread, so the
//! controller itself never needs a lock. Every sender is stamped with the
//! queue generation it was minted in; once the queue is closed the generation
//! moves on and late answers are dropped instead of reaching a torn-down
//! session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use printspool_pages::PageRange;
use thiserror::Error;

use crate::job::DocumentInfo;

/// Monotonic tag carried by every outstanding provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sequence(u64);

impl Sequence {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Completion reported by the remote document provider.
/// 遠端文件提供者回報的完成訊息。
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    LayoutFinished {
        info: DocumentInfo,
        changed: bool,
        sequence: Sequence,
    },
    LayoutFailed {
        error: String,
        sequence: Sequence,
    },
    WriteFinished {
        pages: Vec<PageRange>,
        sequence: Sequence,
    },
    WriteFailed {
        error: String,
        sequence: Sequence,
    },
}

impl ProviderResponse {
    pub fn sequence(&self) -> Sequence {
        match self {
            ProviderResponse::LayoutFinished { sequence, .. }
            | ProviderResponse::LayoutFailed { sequence, .. }
            | ProviderResponse::WriteFinished { sequence, .. }
            | ProviderResponse::WriteFailed { sequence, .. } => *sequence,
        }
    }

    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            ProviderResponse::LayoutFinished { .. } | ProviderResponse::LayoutFailed { .. }
        )
    }
}

/// Errors raised while waiting for provider completions.
/// 等待提供者回應時可能發生的錯誤。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("response queue closed")]
    Closed,
}

struct Envelope {
    generation: u64,
    response: ProviderResponse,
}

/// Thread-safe handle a provider uses to post its answers.
/// 提供者用來回傳結果的跨執行緒控制代碼。
#[derive(Clone)]
pub struct ResponseSender {
    generation: u64,
    live_generation: Arc<AtomicU64>,
    tx: Sender<Envelope>,
}

impl std::fmt::Debug for ResponseSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSender")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl ResponseSender {
    /// Whether the owning session is still accepting answers.
    pub fn is_live(&self) -> bool {
        self.live_generation.load(Ordering::Acquire) == self.generation
    }

    /// Posts `response`; returns `false` when it was dropped because the
    /// owning session is gone.
    pub fn send(&self, response: ProviderResponse) -> bool {
        if !self.is_live() {
            log::debug!(
                "dropping late provider response {} for retired generation {}",
                response.sequence(),
                self.generation
            );
            return false;
        }
        self.tx
            .send(Envelope {
                generation: self.generation,
                response,
            })
            .is_ok()
    }

    pub fn layout_finished(&self, info: DocumentInfo, changed: bool, sequence: Sequence) -> bool {
        self.send(ProviderResponse::LayoutFinished {
            info,
            changed,
            sequence,
        })
    }

    pub fn layout_failed(&self, error: impl Into<String>, sequence: Sequence) -> bool {
        self.send(ProviderResponse::LayoutFailed {
            error: error.into(),
            sequence,
        })
    }

    pub fn write_finished(&self, pages: Vec<PageRange>, sequence: Sequence) -> bool {
        self.send(ProviderResponse::WriteFinished { pages, sequence })
    }

    pub fn write_failed(&self, error: impl Into<String>, sequence: Sequence) -> bool {
        self.send(ProviderResponse::WriteFailed {
            error: error.into(),
            sequence,
        })
    }
}

/// Single-consumer queue drained by the session thread.
/// 由工作階段執行緒取用的單一消費者佇列。
pub struct ResponseQueue {
    generation: u64,
    live_generation: Arc<AtomicU64>,
    closed: bool,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl Default for ResponseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: 1,
            live_generation: Arc::new(AtomicU64::new(1)),
            closed: false,
            tx,
            rx,
        }
    }

    /// Mints a sender bound to the current generation.
    pub fn sender(&self) -> ResponseSender {
        ResponseSender {
            generation: self.generation,
            live_generation: Arc::clone(&self.live_generation),
            tx: self.tx.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Retires the current generation. Senders minted before this call stop
    /// delivering and anything already queued is discarded.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.generation = self.live_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let discarded = self.rx.try_iter().count();
        if discarded > 0 {
            log::debug!("discarded {discarded} queued provider responses on close");
        }
    }

    /// Pops the next live response without blocking.
    pub fn try_next(&self) -> Option<ProviderResponse> {
        if self.closed {
            return None;
        }
        self.rx
            .try_iter()
            .find(|envelope| self.is_current(envelope))
            .map(|envelope| envelope.response)
    }

    /// Waits up to `timeout` for the next live response.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ProviderResponse>, DispatchError> {
        if self.closed {
            return Err(DispatchError::Closed);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(envelope) if self.is_current(&envelope) => return Ok(Some(envelope.response)),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(DispatchError::Closed),
            }
        }
    }

    fn is_current(&self, envelope: &Envelope) -> bool {
        if envelope.generation == self.generation {
            return true;
        }
        log::debug!(
            "dropping provider response {} from generation {}",
            envelope.response.sequence(),
            envelope.generation
        );
        false
    }
}
