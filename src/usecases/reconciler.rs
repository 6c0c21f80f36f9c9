//! Bot Reconciler - Keeps the Multiplexer in Step with the Bot Registry
//!
//! Given the desired bot set (e.g. after a config reload), adds bots
//! that are new or changed, then hands the full set to `clean` so feed
//! streams drop channels of removed bots. Bots whose registration
//! partially failed are retried on the next pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::markets_stream::MarketsStream;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::{BotId, BotWithAccount};
use crate::ports::feed_stream::FeedFactory;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
  /// Bots newly registered with every feed they watch.
  pub added: Vec<BotId>,
  /// Bots whose strategy lookup or registration failed.
  pub failed: Vec<BotId>,
  /// Bots no longer in the desired set.
  pub removed: Vec<BotId>,
  /// Bots already registered with identical records.
  pub unchanged: usize,
}

/// Tracks which bots the multiplexer has fully registered.
pub struct BotReconciler {
  known: HashMap<BotId, BotWithAccount>,
  /// Re-add every bot on the next pass.
  stale: bool,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl BotReconciler {
  /// Start from the enabled bots the multiplexer was constructed with.
  pub fn new(initial: &[BotWithAccount]) -> Self {
    Self {
      known: initial
        .iter()
        .filter(|bot| bot.enabled)
        .map(|bot| (bot.id, bot.clone()))
        .collect(),
      stale: false,
      metrics: None,
    }
  }

  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    metrics.bots.set(gauge(self.known.len()));
    self.metrics = Some(metrics);
    self
  }

  /// Identifiers of registered bots, sorted.
  pub fn known(&self) -> Vec<BotId> {
    let mut ids: Vec<_> = self.known.keys().copied().collect();
    ids.sort_unstable();
    ids
  }

  /// Re-register every desired bot on the next pass, e.g. after
  /// strategy definitions changed under unchanged bot records.
  pub fn mark_stale(&mut self) {
    self.stale = true;
  }

  /// Bring the multiplexer in line with `desired`. Disabled bots are
  /// treated as absent.
  #[instrument(skip_all, fields(desired = desired.len()))]
  pub async fn reconcile<F: FeedFactory>(
    &mut self,
    stream: &MarketsStream<F>,
    desired: &[BotWithAccount],
  ) -> ReconcileSummary {
    let desired: Vec<BotWithAccount> = desired.iter().filter(|bot| bot.enabled).cloned().collect();
    let mut summary = ReconcileSummary::default();

    for bot in &desired {
      if !self.stale && self.known.get(&bot.id) == Some(bot) {
        summary.unchanged += 1;
        continue;
      }

      match stream.add(bot).await {
        Ok(report) if report.is_complete() => {
          self.known.insert(bot.id, bot.clone());
          summary.added.push(bot.id);
        }
        Ok(report) => {
          for (kind, e) in report.failures() {
            warn!(bot_id = bot.id, kind = %kind, error = %e, "Registration incomplete, will retry");
          }
          self.known.remove(&bot.id);
          summary.failed.push(bot.id);
        }
        Err(e) => {
          warn!(bot_id = bot.id, error = %e, "Bot could not be added");
          self.known.remove(&bot.id);
          summary.failed.push(bot.id);
        }
      }
    }

    let keep: HashSet<BotId> = desired.iter().map(|bot| bot.id).collect();
    self.known.retain(|id, _| {
      let stays = keep.contains(id);
      if !stays {
        summary.removed.push(*id);
      }
      stays
    });
    summary.removed.sort_unstable();

    stream.clean(&desired);
    self.stale = false;

    if let Some(metrics) = &self.metrics {
      metrics.bots.set(gauge(self.known.len()));
    }

    info!(
      added = summary.added.len(),
      failed = summary.failed.len(),
      removed = summary.removed.len(),
      unchanged = summary.unchanged,
      "Bots reconciled"
    );
    summary
  }
}

fn gauge(count: usize) -> i64 {
  i64::try_from(count).unwrap_or(i64::MAX)
}
