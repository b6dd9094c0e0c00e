//! # Ingestion Pipeline
//!
//! Wires a `StreamSession` to a `HashtagCounter`. In `Channel` mode the reader
//! only pushes event text onto an unbounded queue and a single consumer task
//! does the counting, so a slow count never stalls the socket. `Inline` mode
//! counts directly in the session callback.
//!
//! Either way events are counted in stream order by exactly one writer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::HashtagCounter;
use crate::ingestors::error::StreamError;
use crate::ingestors::frame::TweetEvent;
use crate::ingestors::session::{SessionSummary, Sleeper, StreamConnector, StreamSession};

/// Where the session callback delivers events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Through a queue drained by a dedicated consumer task.
    #[default]
    Channel,
    /// Counted on the reader task.
    Inline,
}

/// # Ingestion Pipeline
///
/// Holds the shared counter and the queue-depth gauge read by reports.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    counter: Arc<HashtagCounter>,
    queue_depth: Arc<AtomicUsize>,
    mode: DeliveryMode,
}

impl IngestionPipeline {
    /// Creates a pipeline feeding `counter`.
    pub fn new(counter: Arc<HashtagCounter>, mode: DeliveryMode) -> Self {
        Self {
            counter,
            queue_depth: Arc::new(AtomicUsize::new(0)),
            mode,
        }
    }

    /// The counter events are counted into.
    pub fn counter(&self) -> Arc<HashtagCounter> {
        Arc::clone(&self.counter)
    }

    /// Shared gauge of events queued but not yet counted.
    pub fn queue_gauge(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.queue_depth)
    }

    /// Events queued but not yet counted.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Runs `session` to completion and counts every event it delivers.
    ///
    /// In `Channel` mode the queue is drained before this returns, so the
    /// counter reflects every delivered event afterwards.
    pub async fn run<C, S>(
        &self,
        session: &mut StreamSession<C, S>,
        shutdown: &CancellationToken,
    ) -> Result<SessionSummary, StreamError>
    where
        C: StreamConnector,
        S: Sleeper,
    {
        match self.mode {
            DeliveryMode::Inline => {
                let counter = Arc::clone(&self.counter);
                session
                    .run(shutdown, move |event: TweetEvent| counter.update_counts(&event.text))
                    .await
            }
            DeliveryMode::Channel => {
                let (tx, mut rx) = mpsc::unbounded_channel::<TweetEvent>();

                let counter = Arc::clone(&self.counter);
                let depth = Arc::clone(&self.queue_depth);
                let consumer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        depth.fetch_sub(1, Ordering::Relaxed);
                        counter.update_counts(&event.text);
                    }
                    debug!("Event queue closed, consumer exiting.");
                });

                let depth = Arc::clone(&self.queue_depth);
                let result = session
                    .run(shutdown, move |event: TweetEvent| {
                        depth.fetch_add(1, Ordering::Relaxed);
                        if tx.send(event).is_err() {
                            depth.fetch_sub(1, Ordering::Relaxed);
                            error!("Event consumer is gone, dropping event.");
                        }
                    })
                    .await;

                // The callback owned the sender; it is gone now, so the consumer
                // finishes once the backlog is counted.
                let backlog = self.queue_depth();
                if backlog > 0 {
                    info!(backlog, "Draining queued events.");
                }
                if let Err(e) = consumer.await {
                    error!("Event consumer task failed: {}", e);
                }
                result
            }
        }
    }
}
