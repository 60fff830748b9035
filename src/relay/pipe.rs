//! One direction of a session: read, accumulate, detect, transform, forward.
//!
//! # Data Flow
//! ```text
//! ACCUMULATING ──unit complete──▶ MATCH/REPLACE ──▶ FORWARD ──▶ ACCUMULATING
//!      │                                                │
//!      └── read error / EOF ──▶ exit          write error ──▶ exit
//! ```
//!
//! # Design Decisions
//! - Completeness is decided by the framing detector once per message, then by
//!   the chunk tracker for chunked bodies
//! - Whole chunks are forwarded as soon as they arrive; a half-received
//!   chunk-size line is held back for the next unit
//! - The terminal chunk is held until its trailer section is closed, so the
//!   next read always starts a new message
//! - In passthrough mode every read is forwarded as-is

use std::fmt;
use std::mem;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::PipeError;
use crate::http::chunked::{scan_chunks, trailer_end, ChunkScan};
use crate::http::framing;
use crate::http::{headers, rewrite};
use crate::observability::metrics;
use crate::relay::session::SessionOptions;
use crate::relay::state::{ByteCounters, Direction, DirectionState};

/// Size of the per-pipe read buffer.
pub const READ_BUFFER_SIZE: usize = 0xfffff;

/// What kind of bytes a unit holds, which decides how it is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    /// Starts with a head: a whole message, or a head plus leading chunks.
    Message,
    /// Chunks of a body whose head was already forwarded.
    ChunkContinuation,
    /// Raw bytes read in passthrough mode.
    Raw,
}

/// Per-direction relay loop.
pub struct Pipe<R, W> {
    direction: Direction,
    src: R,
    dst: W,
    state: Arc<DirectionState>,
    counters: Arc<ByteCounters>,
    options: Arc<SessionOptions>,
    buffer: Vec<u8>,
    read_buf: Box<[u8]>,
    /// Offset of the chunked body in `buffer` while one is in progress.
    chunked_in_progress: Option<usize>,
}

impl<R, W> Pipe<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        direction: Direction,
        src: R,
        dst: W,
        state: Arc<DirectionState>,
        counters: Arc<ByteCounters>,
        options: Arc<SessionOptions>,
    ) -> Self {
        Self {
            direction,
            src,
            dst,
            state,
            counters,
            options,
            buffer: Vec::new(),
            read_buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            chunked_in_progress: None,
        }
    }

    /// Relay until the source ends or a stream fails.
    ///
    /// On a clean end-of-stream, leftover bytes are flushed and the
    /// destination's write side is shut down before returning.
    pub async fn run(mut self) -> PipeError {
        let arrow = self.direction.arrow();
        self.options.logger.trace(format_args!("{arrow} pipe started"));

        loop {
            let (unit, kind) = match self.accumulate().await {
                Ok(next) => next,
                Err(err) if err.is_eof() => {
                    return match self.finish().await {
                        Ok(()) => err,
                        Err(write_err) => write_err,
                    };
                }
                Err(err) => return err,
            };

            let unit = self.match_replace(unit, kind);
            if let Err(err) = self.forward(&unit).await {
                return err;
            }
        }
    }

    /// Read until the buffer holds a forwardable unit.
    async fn accumulate(&mut self) -> Result<(Vec<u8>, UnitKind), PipeError> {
        let arrow = self.direction.arrow();
        loop {
            let n = match self.src.read(&mut self.read_buf).await {
                Ok(0) => return Err(PipeError::Eof),
                Ok(n) => n,
                Err(err) => return Err(PipeError::Read(err)),
            };
            self.options.logger.trace(format_args!("{arrow} buffer read: {n}"));
            self.buffer.extend_from_slice(&self.read_buf[..n]);

            if self.state.is_passthrough() {
                self.chunked_in_progress = None;
                return Ok((mem::take(&mut self.buffer), UnitKind::Raw));
            }
            if let Some(unit) = self.take_unit() {
                return Ok(unit);
            }
        }
    }

    /// Split the forwardable prefix off the buffer, if there is one.
    fn take_unit(&mut self) -> Option<(Vec<u8>, UnitKind)> {
        let body_start = match self.chunked_in_progress {
            Some(start) => start,
            None => {
                let (complete, is_chunked) =
                    framing::is_complete(&self.buffer, self.direction.is_request());
                if !complete {
                    return None;
                }
                if !is_chunked {
                    return Some((mem::take(&mut self.buffer), UnitKind::Message));
                }
                let start = headers::payload_start(&self.buffer).unwrap_or(0);
                self.chunked_in_progress = Some(start);
                start
            }
        };
        let kind = if body_start == 0 {
            UnitKind::ChunkContinuation
        } else {
            UnitKind::Message
        };

        match scan_chunks(&self.buffer[body_start..]) {
            ChunkScan::Incomplete => None,
            ChunkScan::Terminal { end } => {
                trailer_end(&self.buffer, body_start + end)?;
                self.chunked_in_progress = None;
                Some((mem::take(&mut self.buffer), kind))
            }
            ChunkScan::Malformed { offset } => {
                self.options.logger.warn(format_args!(
                    "{} malformed chunk size line at offset {}, forwarding as-is",
                    self.direction.arrow(),
                    body_start + offset
                ));
                self.chunked_in_progress = None;
                Some((mem::take(&mut self.buffer), kind))
            }
            ChunkScan::SizeLinePending { offset } => {
                let split = body_start + offset;
                if split == 0 {
                    return None;
                }
                let pending = self.buffer.split_off(split);
                let unit = mem::replace(&mut self.buffer, pending);
                self.chunked_in_progress = Some(0);
                Some((unit, kind))
            }
        }
    }

    /// Run hooks and the payload rewriter, then look for an upgrade.
    fn match_replace(&self, mut unit: Vec<u8>, kind: UnitKind) -> Vec<u8> {
        let options = &self.options;

        if let Some(matcher) = &options.hooks.matcher {
            matcher(&unit);
        }
        if let Some(replacer) = &options.hooks.replacer {
            unit = replacer(unit);
        }

        if kind == UnitKind::Raw || self.state.is_passthrough() {
            return unit;
        }

        if let Some(transform) = options.transforms.for_direction(self.direction) {
            let log = options.logger.as_ref();
            unit = match kind {
                UnitKind::ChunkContinuation => {
                    rewrite::edit_chunked_payload(&unit, transform.as_ref(), log)
                }
                _ => rewrite::edit_http_message(&unit, transform.as_ref(), log),
            };
        }

        if kind == UnitKind::Message
            && options
                .indicators
                .detect(self.direction, headers::header_block(&unit))
            && self.state.enter_passthrough()
        {
            options.logger.debug(format_args!(
                "{} multiplexed stream detected, switching to passthrough",
                self.direction.arrow()
            ));
            metrics::record_passthrough(self.direction);
        }

        unit
    }

    /// Write the unit fully, counting every byte that reaches the destination.
    async fn forward(&mut self, unit: &[u8]) -> Result<(), PipeError> {
        let verb = match self.direction {
            Direction::Outbound => "sent",
            Direction::Inbound => "received",
        };
        self.options.logger.debug(format_args!(
            "{} {} bytes {}",
            self.direction.arrow(),
            unit.len(),
            verb
        ));
        self.options.logger.trace(format_args!(
            "{}",
            Dump {
                bytes: unit,
                hex: self.options.dump_hex
            }
        ));

        let mut written = 0;
        while written < unit.len() {
            let n = self
                .dst
                .write(&unit[written..])
                .await
                .map_err(PipeError::Write)?;
            if n == 0 {
                return Err(PipeError::Write(std::io::ErrorKind::WriteZero.into()));
            }
            written += n;
            self.counters.add(self.direction, n as u64);
            metrics::record_bytes(self.direction, n as u64);
        }
        self.dst.flush().await.map_err(PipeError::Write)
    }

    /// Flush leftover bytes, then half-close the destination.
    ///
    /// A failed flush is returned; a failed half-close is ignored.
    async fn finish(&mut self) -> Result<(), PipeError> {
        if !self.buffer.is_empty() {
            let leftover = mem::take(&mut self.buffer);
            self.forward(&leftover).await?;
        }
        let _ = self.dst.shutdown().await;
        Ok(())
    }
}

/// Lazily formatted unit dump; only rendered when trace output is enabled.
struct Dump<'a> {
    bytes: &'a [u8],
    hex: bool,
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hex {
            for b in self.bytes {
                write!(f, "{b:02x}")?;
            }
            Ok(())
        } else {
            f.write_str(&String::from_utf8_lossy(self.bytes))
        }
    }
}
