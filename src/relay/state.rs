//! State shared between the two pipes of one session.
//!
//! # Responsibilities
//! - Passthrough flag (monotonic, visible to both directions)
//! - Byte counters per direction
//! - Single-slot shutdown signal and the "already failed once" latch
//!
//! # Design Decisions
//! - Lock-free: atomics only, except the one-shot sender slot
//! - A stale passthrough read costs at most one more parsed cycle

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::PipeError;

/// Which way bytes flow through a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local → remote (requests).
    Outbound,
    /// Remote → local (responses).
    Inbound,
}

impl Direction {
    /// Outbound traffic carries requests, inbound traffic carries responses.
    pub fn is_request(self) -> bool {
        self == Direction::Outbound
    }

    /// Log prefix, `>>>` for outbound and `<<<` for inbound.
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::Outbound => ">>>",
            Direction::Inbound => "<<<",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag shared by both directions of a session.
///
/// Once set it stays set: both pipes stop HTTP-aware framing and relay raw bytes.
#[derive(Debug, Default)]
pub struct DirectionState {
    passthrough: AtomicBool,
}

impl DirectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough.load(Ordering::SeqCst)
    }

    /// Switch to passthrough. Returns true only for the call that flipped the flag.
    pub fn enter_passthrough(&self) -> bool {
        !self.passthrough.swap(true, Ordering::SeqCst)
    }
}

/// Bytes actually written, per direction.
#[derive(Debug, Default)]
pub struct ByteCounters {
    sent: AtomicU64,
    received: AtomicU64,
}

impl ByteCounters {
    pub fn add(&self, direction: Direction, n: u64) {
        let counter = match direction {
            Direction::Outbound => &self.sent,
            Direction::Inbound => &self.received,
        };
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Bytes written to the remote side.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Bytes written to the local side.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Releases exactly one waiter, exactly once.
#[derive(Debug)]
pub struct ShutdownSignal {
    slot: Mutex<Option<oneshot::Sender<()>>>,
}

impl ShutdownSignal {
    /// Create the signal and the receiver the session waits on.
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Post the signal. Returns false if it was already posted.
    pub fn post(&self) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// What the latch did with a reported pipe exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownAction {
    /// First failure, a clean outbound end-of-stream: wait for the response side.
    Deferred,
    /// Shutdown signal posted.
    Posted,
}

/// Decides when a pipe exit tears the whole session down.
#[derive(Debug)]
pub struct FailureLatch {
    erred: AtomicBool,
    signal: ShutdownSignal,
}

impl FailureLatch {
    pub fn new(signal: ShutdownSignal) -> Self {
        Self {
            erred: AtomicBool::new(false),
            signal,
        }
    }

    /// Record a pipe exit and post the shutdown signal unless it may be deferred.
    pub fn report(&self, direction: Direction, err: &PipeError) -> ShutdownAction {
        let already_failed = self.erred.swap(true, Ordering::SeqCst);
        if !already_failed && direction == Direction::Outbound && err.is_eof() {
            return ShutdownAction::Deferred;
        }
        self.signal.post();
        ShutdownAction::Posted
    }

    pub fn has_failed(&self) -> bool {
        self.erred.load(Ordering::SeqCst)
    }
}
