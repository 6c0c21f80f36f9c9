//! Feed Replay - Publish Recorded Feed Events from JSONL
//!
//! Each line of the file is one `RecordedFeedEvent`, tagged by
//! `feed` (`candle`, `orderbook`, `trade`, `ticker`). Events are
//! pushed into the matching local feed in file order.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};

use super::local::LocalFeedFactory;
use crate::domain::{CandleEvent, OrderbookEvent, TickerEvent, TradeEvent};
use crate::ports::feed_stream::FeedSet;

/// One recorded feed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "feed", rename_all = "lowercase")]
pub enum RecordedFeedEvent {
    Candle(CandleEvent),
    Orderbook(OrderbookEvent),
    Trade(TradeEvent),
    Ticker(TickerEvent),
}

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events delivered to an open channel.
    pub published: usize,
    /// Events whose market had no open channel.
    pub dropped: usize,
    /// Lines that failed to parse.
    pub skipped: usize,
}

/// Push one recorded event into its feed. Returns whether it was delivered.
pub fn publish(feeds: &FeedSet<LocalFeedFactory>, event: RecordedFeedEvent) -> bool {
    match event {
        RecordedFeedEvent::Candle(event) => feeds.candles.publish(event),
        RecordedFeedEvent::Orderbook(event) => feeds.orderbook.publish(event),
        RecordedFeedEvent::Trade(event) => feeds.trades.publish(event),
        RecordedFeedEvent::Ticker(event) => feeds.ticker.publish(event),
    }
}

/// Replay a JSONL file into the local feeds.
///
/// `pace` inserts a delay between events. Malformed lines are logged
/// and skipped.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn replay_file(
    path: impl AsRef<Path>,
    feeds: &FeedSet<LocalFeedFactory>,
    pace: Option<Duration>,
) -> Result<ReplayStats> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open replay file: {}", path.display()))?;

    let mut lines = BufReader::new(file).lines();
    let mut stats = ReplayStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read replay file")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: RecordedFeedEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed replay line");
                stats.skipped += 1;
                continue;
            }
        };

        if publish(feeds, event) {
            stats.published += 1;
        } else {
            stats.dropped += 1;
        }

        if let Some(delay) = pace {
            tokio::time::sleep(delay).await;
        }
    }

    info!(
        published = stats.published,
        dropped = stats.dropped,
        skipped = stats.skipped,
        "Replay finished"
    );
    Ok(stats)
}
