use chrono::{DateTime, Local};
use lib_common::core::{CounterSnapshot, HashtagCounter};
use lib_common::utils::format_thousands;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Formats one statistics block. `previous_events` is the event count of the
/// previous report and drives the `(+n)` delta.
pub fn render_report(snapshot: &CounterSnapshot, queue_length: usize, previous_events: u64, at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Time: {}", at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Queue length: {}", format_thousands(queue_length as u64));
    let _ = writeln!(
        out,
        "Total tweets: {} (+{})",
        format_thousands(snapshot.events),
        format_thousands(snapshot.events.saturating_sub(previous_events))
    );
    let _ = writeln!(out, "Number of hashtags: {}", format_thousands(snapshot.distinct_hashtags as u64));
    let _ = writeln!(out, "Top {} hashtags:", snapshot.top.len());
    for entry in &snapshot.top {
        let _ = writeln!(out, "{:<30} {}", entry.token, format_thousands(entry.count));
    }
    out
}

pub async fn run(
    counter: Arc<HashtagCounter>,
    queue_depth: Arc<AtomicUsize>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut report_interval = interval_at(Instant::now() + period, period);
    let mut previous_events = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Reporter received shutdown signal.");
                break;
            }
            _ = report_interval.tick() => {
                let snapshot = counter.snapshot();
                let report = render_report(&snapshot, queue_depth.load(Ordering::Relaxed), previous_events, Local::now());
                info!("\n{}", report);
                previous_events = snapshot.events;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn report_lists_counts_and_leaderboard() {
        let counter = HashtagCounter::new();
        for _ in 0..1_200 {
            counter.update_counts("#hashtags #xunit");
        }
        counter.update_counts("#test");
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        let report = render_report(&counter.snapshot(), 3, 1_000, at);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[0], "Time: 2024-05-01 12:30:00");
        assert_eq!(lines[1], "Queue length: 3");
        assert_eq!(lines[2], "Total tweets: 1,201 (+201)");
        assert_eq!(lines[3], "Number of hashtags: 3");
        assert_eq!(lines[4], "Top 3 hashtags:");
        assert_eq!(lines[5], format!("{:<30} {}", "#hashtags", "1,200"));
        assert_eq!(lines[6], format!("{:<30} {}", "#xunit", "1,200"));
        assert_eq!(lines[7], format!("{:<30} {}", "#test", "1"));
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn empty_report() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let report = render_report(&CounterSnapshot::default(), 0, 0, at);
        assert!(report.contains("Total tweets: 0 (+0)"));
        assert!(report.contains("Top 0 hashtags:"));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::new(HashtagCounter::new()),
            Arc::new(AtomicUsize::new(0)),
            Duration::from_secs(60),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
