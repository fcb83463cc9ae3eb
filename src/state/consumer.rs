use super::sink::TranscriptSink;
use crate::api::logging::{emit_decode_error, emit_fragment_parse_error};
use crate::api::reader::StreamReader;
use crate::api::stream::{ParsedChunk, StreamParser};
use crate::config::TrailingLinePolicy;
use crate::error::TransportError;
use anyhow::Result;
use bytes::Bytes;
use futures::Stream;
use tokio_util::sync::CancellationToken;

/// Consumer lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Draining,
    Error,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: usize,
    pub fragments_applied: usize,
    pub parse_errors: usize,
    pub decode_errors: usize,
    pub discarded_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(StreamStats),
    Cancelled(StreamStats),
}

impl StreamOutcome {
    pub fn stats(&self) -> StreamStats {
        match self {
            StreamOutcome::Completed(stats) | StreamOutcome::Cancelled(stats) => *stats,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamOutcome::Cancelled(_))
    }
}

/// Buffered text and the closed flag for one stream.
#[derive(Debug, Default)]
pub struct StreamState {
    parser: StreamParser,
    closed: bool,
}

impl StreamState {
    pub fn pending_buffer(&self) -> &str {
        self.parser.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Turns one response body into transcript updates.
///
/// Every chunk is decoded, split into lines, parsed and applied before the
/// next one is requested, so fragments land in the order their lines appear
/// in the byte stream.
pub struct StreamConsumer {
    state: StreamState,
    phase: StreamPhase,
    stats: StreamStats,
    policy: TrailingLinePolicy,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self::new(TrailingLinePolicy::default())
    }
}

impl StreamConsumer {
    pub fn new(policy: TrailingLinePolicy) -> Self {
        Self {
            state: StreamState::default(),
            phase: StreamPhase::Idle,
            stats: StreamStats::default(),
            policy,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Process one raw chunk. Returns the number of fragments applied.
    pub fn process_chunk(&mut self, chunk: &[u8], sink: &mut TranscriptSink) -> usize {
        if self.state.closed {
            return 0;
        }
        self.phase = StreamPhase::Streaming;
        self.stats.chunks += 1;

        let parsed = self.state.parser.process(chunk);
        self.apply_parsed(parsed, sink)
    }

    /// The transport completed: resolve the residual buffer and close.
    pub fn finish(&mut self, sink: &mut TranscriptSink) -> usize {
        if self.state.closed {
            return 0;
        }
        self.phase = StreamPhase::Draining;

        let parsed = self.state.parser.finish(self.policy);
        let applied = self.apply_parsed(parsed, sink);
        self.close();
        applied
    }

    /// The transport failed. Already-published content stays as it is.
    pub fn fail(&mut self) {
        if self.state.closed {
            return;
        }
        self.phase = StreamPhase::Error;
        self.close();
    }

    /// Stop without draining.
    pub fn cancel(&mut self) {
        if !self.state.closed {
            self.close();
        }
    }

    /// Pull chunks from `reader` until it completes, fails, or `cancel`
    /// fires. The reader is released on every path before this returns.
    pub async fn run<S>(
        &mut self,
        mut reader: StreamReader<S>,
        sink: &mut TranscriptSink,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, TransportError>
    where
        S: Stream<Item = Result<Bytes>> + Unpin,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    reader.release();
                    self.cancel();
                    return Ok(StreamOutcome::Cancelled(self.stats));
                }
                next = reader.next_chunk() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.process_chunk(&chunk, sink);
                }
                Some(Err(error)) => {
                    self.fail();
                    return Err(error);
                }
                None => {
                    self.finish(sink);
                    return Ok(StreamOutcome::Completed(self.stats));
                }
            }
        }
    }

    fn apply_parsed(&mut self, parsed: ParsedChunk, sink: &mut TranscriptSink) -> usize {
        for error in &parsed.decode_errors {
            self.stats.decode_errors += 1;
            emit_decode_error(error);
        }

        let mut applied = 0;
        for line in parsed.lines {
            match line {
                Ok(fragment) => {
                    if sink.apply(&fragment) {
                        applied += 1;
                    }
                }
                Err(error) => {
                    self.stats.parse_errors += 1;
                    emit_fragment_parse_error(&error);
                }
            }
        }

        if let Some(discarded) = parsed.discarded {
            self.stats.discarded_bytes += discarded.len();
        }

        self.stats.fragments_applied += applied;
        applied
    }

    fn close(&mut self) {
        self.state.closed = true;
        self.phase = StreamPhase::Closed;
    }
}
