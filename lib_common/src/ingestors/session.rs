//! # Stream Session
//!
//! Drives one long-lived streaming connection at a time through the states
//! `Connecting -> Streaming -> BackingOff -> Connecting | Terminated`.
//!
//! ## Design
//!
//! - The retry bookkeeping is a plain value (`RetryState`) advanced by the pure
//!   `advance` function, so backoff behaviour can be tested without I/O.
//! - Connecting and sleeping go through the `StreamConnector` and `Sleeper`
//!   traits. Production uses `HttpStreamConnector` and `TokioSleeper`; tests
//!   inject scripted connectors and a sleeper that records instead of waiting.
//! - Each successful event resets the retry count. A clean end of stream counts
//!   as a transient disconnect and goes through `BackingOff` like any other.
//! - Only process shutdown (the `CancellationToken`) interrupts a backoff wait
//!   or a read. There is no per-read timeout; keep-alive lines are the liveness
//!   signal.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::ingestors::error::{FailureClass, RateLimitPolicy, StreamError};
use crate::ingestors::frame::{FrameAssembler, LineFramer, StreamFrame, TweetEvent, DEFAULT_MAX_FRAME_BYTES};
use crate::utils::int_to_ordinal;

/// Default number of consecutive failures before the session gives up.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 15;
/// Default backoff unit; the n-th consecutive retry waits `unit * 2^n`.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Response body as a stream of byte chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Opens the streaming connection. Resolves once response headers arrived.
pub trait StreamConnector: Send + Sync {
    /// Starts one connection attempt.
    fn connect(&self) -> impl Future<Output = Result<ByteStream, StreamError>> + Send;
}

/// Waits for a backoff delay.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// The session's position in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Opening the request.
    Connecting,
    /// Reading frames from an open response.
    Streaming,
    /// Waiting before the next attempt.
    BackingOff,
    /// Retries are exhausted.
    Terminated,
}

/// Something that happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// Response headers arrived.
    Connected,
    /// A success event was handed to the callback.
    EventDelivered,
    /// The attempt failed transiently or the stream ended.
    Disconnected,
    /// The backoff wait is over.
    BackoffElapsed,
}

/// State plus consecutive retry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Current state.
    pub state: SessionState,
    /// Consecutive failed attempts since the last delivered event.
    pub retry_count: u32,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            state: SessionState::Connecting,
            retry_count: 0,
        }
    }
}

/// Pure transition function of the session.
///
/// Inputs that make no sense in the current state leave it unchanged.
pub fn advance(current: RetryState, input: SessionInput, max_retry_attempts: u32) -> RetryState {
    use SessionInput::*;
    use SessionState::*;

    match (current.state, input) {
        (Terminated, _) => current,
        (Connecting, Connected) => RetryState { state: Streaming, ..current },
        (Streaming, EventDelivered) => RetryState {
            state: Streaming,
            retry_count: 0,
        },
        (Connecting | Streaming, Disconnected) => RetryState { state: BackingOff, ..current },
        (BackingOff, BackoffElapsed) => {
            let retry_count = current.retry_count.saturating_add(1);
            let state = if retry_count >= max_retry_attempts { Terminated } else { Connecting };
            RetryState { state, retry_count }
        }
        _ => current,
    }
}

/// Delay before the retry following `retry_count` consecutive failures:
/// `unit * 2^retry_count`, saturating.
pub fn backoff_delay(retry_count: u32, unit: Duration) -> Duration {
    let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
    unit.saturating_mul(factor)
}

/// Tunables of a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Consecutive failures after which the session terminates.
    pub max_retry_attempts: u32,
    /// Base unit of the exponential backoff.
    pub backoff_unit: Duration,
    /// Treatment of 429 rejections.
    pub rate_limit_policy: RateLimitPolicy,
    /// Upper bound of a buffered partial frame.
    pub max_frame_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            rate_limit_policy: RateLimitPolicy::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `max_retry_attempts` consecutive failures.
    RetriesExhausted {
        /// Connection attempts made over the session's lifetime.
        attempts: u32,
    },
    /// The shutdown token was cancelled.
    Shutdown,
}

/// Counters reported when a session returns normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Why the session ended.
    pub outcome: SessionOutcome,
    /// Connection attempts made.
    pub attempts: u32,
    /// Events handed to the callback.
    pub events: u64,
    /// Partial frames given up on.
    pub discarded_frames: u64,
}

/// # Stream Session
///
/// Owns the connector, the sleeper and the retry state. Call `run` once.
pub struct StreamSession<C, S = TokioSleeper> {
    connector: C,
    sleeper: S,
    settings: SessionSettings,
    retry: RetryState,
    attempts: u32,
    events: u64,
    discarded_frames: u64,
}

impl<C: StreamConnector> StreamSession<C, TokioSleeper> {
    /// Creates a session that sleeps on the tokio clock.
    pub fn new(connector: C, settings: SessionSettings) -> Self {
        Self::with_sleeper(connector, TokioSleeper, settings)
    }
}

impl<C: StreamConnector, S: Sleeper> StreamSession<C, S> {
    /// Creates a session with an explicit sleeper.
    pub fn with_sleeper(connector: C, sleeper: S, settings: SessionSettings) -> Self {
        Self {
            connector,
            sleeper,
            settings,
            retry: RetryState::default(),
            attempts: 0,
            events: 0,
            discarded_frames: 0,
        }
    }

    /// Current state and retry count.
    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// Runs until retries are exhausted, shutdown is requested, or a fatal
    /// error occurs. `on_event` receives every success event in stream order.
    ///
    /// # Errors
    /// Returns the first error classified as fatal, e.g.
    /// `Status: 429 - Too Many Requests` under `RateLimitPolicy::Abort`.
    pub async fn run<F>(&mut self, shutdown: &CancellationToken, mut on_event: F) -> Result<SessionSummary, StreamError>
    where
        F: FnMut(TweetEvent) + Send,
    {
        let max = self.settings.max_retry_attempts;

        loop {
            match self.retry.state {
                SessionState::Terminated => {
                    error!(attempts = self.attempts, "Maximum retry attempts reached. Exiting program.");
                    return Ok(self.summary(SessionOutcome::RetriesExhausted { attempts: self.attempts }));
                }
                SessionState::Connecting | SessionState::Streaming => {
                    let attempt = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => None,
                        result = self.connect_and_stream(&mut on_event) => Some(result),
                    };
                    let Some(result) = attempt else {
                        info!("Shutdown requested, closing the stream.");
                        return Ok(self.summary(SessionOutcome::Shutdown));
                    };

                    let reason = match result {
                        Ok(()) => "the stream was closed by the remote host".to_string(),
                        Err(e) => match e.classify(self.settings.rate_limit_policy) {
                            FailureClass::Transient => e.to_string(),
                            FailureClass::Fatal => {
                                debug!(error = %e, "Fatal stream error, stopping the session.");
                                return Err(e);
                            }
                        },
                    };

                    let retry = self.retry.retry_count;
                    warn!(
                        retry = retry + 1,
                        delay_ms = backoff_delay(retry, self.settings.backoff_unit).as_millis() as u64,
                        "Reconnecting {} try... Error: {}",
                        int_to_ordinal(i64::from(retry) + 1),
                        reason
                    );
                    self.retry = advance(self.retry, SessionInput::Disconnected, max);
                }
                SessionState::BackingOff => {
                    let delay = backoff_delay(self.retry.retry_count, self.settings.backoff_unit);
                    let waited = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => false,
                        _ = self.sleeper.sleep(delay) => true,
                    };
                    if !waited {
                        info!("Shutdown requested during backoff.");
                        return Ok(self.summary(SessionOutcome::Shutdown));
                    }
                    self.retry = advance(self.retry, SessionInput::BackoffElapsed, max);
                }
            }
        }
    }

    fn summary(&self, outcome: SessionOutcome) -> SessionSummary {
        SessionSummary {
            outcome,
            attempts: self.attempts,
            events: self.events,
            discarded_frames: self.discarded_frames,
        }
    }

    /// One connection: connect, then read until the body ends or fails.
    /// `Ok(())` means the server closed the stream cleanly.
    async fn connect_and_stream<F>(&mut self, on_event: &mut F) -> Result<(), StreamError>
    where
        F: FnMut(TweetEvent) + Send,
    {
        let max = self.settings.max_retry_attempts;
        self.retry = RetryState { state: SessionState::Connecting, ..self.retry };
        self.attempts += 1;
        debug!(attempt = self.attempts, "Connecting to the stream.");

        let mut body = self.connector.connect().await?;
        self.retry = advance(self.retry, SessionInput::Connected, max);
        info!(attempt = self.attempts, "Connected, streaming events.");

        let mut framer = LineFramer::with_limit(self.settings.max_frame_bytes);
        let mut assembler = FrameAssembler::new(self.settings.max_frame_bytes);

        let mut result = 'read: loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    for line in framer.push(&chunk) {
                        if let Err(e) = self.handle_line(&mut assembler, &line, on_event) {
                            break 'read Err(e);
                        }
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };

        if result.is_ok() {
            if let Some(tail) = framer.finish() {
                result = self.handle_line(&mut assembler, &tail, on_event);
            }
        }

        let dropped = assembler.abandon();
        if dropped > 0 {
            debug!(bytes = dropped, "Discarded partial frame at end of connection.");
        }
        self.discarded_frames += assembler.discarded() + framer.discarded();
        result
    }

    fn handle_line<F>(&mut self, assembler: &mut FrameAssembler, line: &str, on_event: &mut F) -> Result<(), StreamError>
    where
        F: FnMut(TweetEvent) + Send,
    {
        if line.trim().is_empty() && !assembler.is_buffering() {
            trace!("Keep-alive received.");
            return Ok(());
        }

        match assembler.push_line(line) {
            StreamFrame::Tweet(event) => {
                self.events += 1;
                self.retry = advance(self.retry, SessionInput::EventDelivered, self.settings.max_retry_attempts);
                on_event(event);
            }
            StreamFrame::ErrorEvent(err) if err.is_fatal_for_connection() => {
                return Err(err.into_error());
            }
            StreamFrame::ErrorEvent(err) => {
                warn!(status = err.status, title = ?err.title, detail = %err.detail, "Ignoring error object from the stream.");
            }
            StreamFrame::Incomplete => trace!("Buffering partial frame."),
            StreamFrame::KeepAlive => debug!(line = %line, "Discarded unrecognised line."),
        }
        Ok(())
    }
}
