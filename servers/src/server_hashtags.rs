use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lib_common::core::HashtagCounter;
use lib_common::core::frequency_store::INITIAL_TAG_CAPACITY;
use lib_common::ingestors::{IngestionPipeline, SessionOutcome, StreamSession};
use lib_common::loggers::setup_logging;
use lib_common::retrieve::HttpStreamConnector;

mod hashtag_logic;
use hashtag_logic::{config, reporter};

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Ctrl-C received, initiating shutdown."),
                    _ = term_signal.recv() => info!("SIGTERM received, initiating shutdown."),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM ({}), only Ctrl-C will stop the tracker.", e);
                let _ = signal::ctrl_c().await;
                info!("Ctrl-C received, initiating shutdown.");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Ctrl-C received, initiating shutdown.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    let settings = config.tracker_settings()?;
    let log_guard = setup_logging(&settings.logging)?;

    info!(
        url = %settings.endpoint.url(),
        max_retry_attempts = settings.session.max_retry_attempts,
        rate_limit_policy = ?settings.session.rate_limit_policy,
        delivery = ?settings.delivery,
        "Starting hashtag tracker."
    );

    let counter = Arc::new(HashtagCounter::with_capacity(INITIAL_TAG_CAPACITY));
    let pipeline = IngestionPipeline::new(Arc::clone(&counter), settings.delivery);
    let connector = HttpStreamConnector::new(&settings.endpoint)?;
    let mut session = StreamSession::new(connector, settings.session.clone());

    let shutdown = CancellationToken::new();

    let reporter_handle = tokio::spawn(reporter::run(
        Arc::clone(&counter),
        pipeline.queue_gauge(),
        settings.report_interval,
        shutdown.clone(),
    ));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_token.cancel();
    });

    let result = pipeline.run(&mut session, &shutdown).await;

    // Stop the reporter whichever way the session ended.
    shutdown.cancel();
    let _ = reporter_handle.await;

    let snapshot = counter.snapshot();
    match result {
        Ok(summary) => {
            match summary.outcome {
                SessionOutcome::RetriesExhausted { attempts } => {
                    info!(attempts, "Stream session ended after exhausting its retries.")
                }
                SessionOutcome::Shutdown => info!("Stream session stopped on request."),
            }
            info!(
                events = snapshot.events,
                hashtags = snapshot.distinct_hashtags,
                discarded_frames = summary.discarded_frames,
                "Shutdown complete."
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            // Flush the file writer before leaving without unwinding.
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
