//! Markets Stream - Fan-in of the Four Feed Kinds into One Event Stream
//!
//! Owns one feed stream per kind (candle, order book, trade, ticker),
//! retags every feed event into a `MarketEvent` and publishes it on a
//! broadcast channel for strategy engines.
//!
//! Lifecycle:
//! 1. `new` builds the feeds from the initial bot set and binds one
//!    handler per feed
//! 2. `create` opens the feeds' channels, one kind after another
//! 3. `add` / `clean` adjust the registered bots at runtime
//! 4. `destroy` releases the handlers, then destroys the feeds

use std::sync::{Arc, Weak};
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::{get_watchers, BotId, BotWithAccount, FeedKind, MarketEvent};
use crate::error::{FeedError, MuxError};
use crate::ports::feed_stream::{FeedControl, FeedFactory, FeedSet, FeedStream, SubscriptionId};
use crate::ports::strategy::StrategyResolver;

/// Default capacity of the market event channel.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Construction options.
#[derive(Clone)]
pub struct StreamOptions {
  /// Buffered events per subscriber before it starts lagging.
  pub capacity: usize,
  /// Metrics sink, if exported.
  pub metrics: Option<Arc<MetricsRegistry>>,
}

impl Default for StreamOptions {
  fn default() -> Self {
    Self {
      capacity: DEFAULT_CAPACITY,
      metrics: None,
    }
  }
}

/// Outcome of registering a bot with one feed kind.
#[derive(Debug)]
pub enum Registration {
  /// The bot's strategy does not watch this kind.
  Skipped,
  /// The feed accepted the bot.
  Registered,
  /// The feed rejected the bot.
  Failed(FeedError),
}

/// Per-kind result of [`MarketsStream::add`].
#[derive(Debug)]
pub struct RegistrationReport {
  bot_id: BotId,
  outcomes: [Registration; 4],
}

impl RegistrationReport {
  fn new(bot_id: BotId) -> Self {
    Self {
      bot_id,
      outcomes: std::array::from_fn(|_| Registration::Skipped),
    }
  }

  pub const fn bot_id(&self) -> BotId {
    self.bot_id
  }

  pub const fn outcome(&self, kind: FeedKind) -> &Registration {
    &self.outcomes[kind.index()]
  }

  /// Kinds the bot is now registered with.
  pub fn registered(&self) -> impl Iterator<Item = FeedKind> + '_ {
    FeedKind::ALL
      .into_iter()
      .filter(|kind| matches!(self.outcome(*kind), Registration::Registered))
  }

  /// Kinds whose feed rejected the bot.
  pub fn failures(&self) -> impl Iterator<Item = (FeedKind, &FeedError)> + '_ {
    FeedKind::ALL
      .into_iter()
      .filter_map(|kind| match self.outcome(kind) {
        Registration::Failed(e) => Some((kind, e)),
        _ => None,
      })
  }

  /// True if no feed kind was needed.
  pub fn is_noop(&self) -> bool {
    self.outcomes
      .iter()
      .all(|outcome| matches!(outcome, Registration::Skipped))
  }

  /// True if every attempted registration succeeded.
  pub fn is_complete(&self) -> bool {
    self.failures().next().is_none()
  }

  /// Collapse into the first failure, in `FeedKind::ALL` order.
  pub fn into_result(self) -> Result<(), MuxError> {
    for (kind, outcome) in FeedKind::ALL.into_iter().zip(self.outcomes) {
      if let Registration::Failed(source) = outcome {
        return Err(MuxError::FeedRegistration { kind, source });
      }
    }
    Ok(())
  }
}

/// Multiplexes the four feed streams into one `MarketEvent` channel.
pub struct MarketsStream<F: FeedFactory> {
  feeds: FeedSet<F>,
  strategies: Arc<dyn StrategyResolver>,
  /// The only strong sender. Bound handlers hold a `Weak`, so the
  /// channel closes when the stream goes away even if a feed keeps a
  /// handler it failed to release.
  market_tx: Arc<broadcast::Sender<MarketEvent>>,
  /// One handler binding per feed kind.
  subscriptions: Vec<(FeedKind, SubscriptionId)>,
  metrics: Option<Arc<MetricsRegistry>>,
  destroyed: bool,
}

impl<F: FeedFactory> MarketsStream<F> {
  /// Build the four feeds, each seeded with `bots`, and bind their
  /// handlers. No channel is opened until [`create`](Self::create).
  pub fn new(
    factory: &F,
    bots: &[BotWithAccount],
    strategies: Arc<dyn StrategyResolver>,
    options: StreamOptions,
  ) -> Self {
    Self::from_feeds(FeedSet::build(factory, bots), strategies, options)
  }

  /// Take ownership of pre-built feeds and bind their handlers.
  pub fn from_feeds(
    feeds: FeedSet<F>,
    strategies: Arc<dyn StrategyResolver>,
    options: StreamOptions,
  ) -> Self {
    let (market_tx, _) = broadcast::channel(options.capacity.max(1));

    let mut stream = Self {
      feeds,
      strategies,
      market_tx: Arc::new(market_tx),
      subscriptions: Vec::with_capacity(FeedKind::ALL.len()),
      metrics: options.metrics,
      destroyed: false,
    };
    stream.bind_feeds();
    stream
  }

  /// Receive every market event published from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
    self.market_tx.subscribe()
  }

  /// The owned feed streams.
  pub const fn feeds(&self) -> &FeedSet<F> {
    &self.feeds
  }

  /// Handler bindings currently held, one per feed kind.
  pub fn subscriptions(&self) -> &[(FeedKind, SubscriptionId)] {
    &self.subscriptions
  }

  /// Register a bot with every feed kind its strategy watches.
  ///
  /// Registrations run concurrently and fail independently; the
  /// report says what happened per kind. Only a strategy lookup
  /// failure is returned as an error.
  #[instrument(skip(self, bot), fields(bot_id = bot.id, template = %bot.template))]
  pub async fn add(&self, bot: &BotWithAccount) -> Result<RegistrationReport, MuxError> {
    let strategy = self.strategies.find_strategy(&bot.template)?;
    let watchers = get_watchers(&strategy, bot);

    let mut report = RegistrationReport::new(bot.id);
    if watchers.is_empty() {
      debug!("Bot watches no feeds");
      return Ok(report);
    }

    let attempts = self
      .controls()
      .into_iter()
      .filter(|(kind, _)| !watchers.for_kind(*kind).is_empty())
      .map(|(kind, feed)| async move { (kind, feed.add_bot(bot).await) });

    for (kind, result) in join_all(attempts).await {
      if let Some(metrics) = &self.metrics {
        metrics.record_registration(kind, result.is_ok());
      }
      report.outcomes[kind.index()] = match result {
        Ok(()) => Registration::Registered,
        Err(e) => {
          warn!(kind = %kind, error = %e, "Feed registration failed");
          Registration::Failed(e)
        }
      };
    }

    info!(
      registered = ?report.registered().collect::<Vec<_>>(),
      failed = report.failures().count(),
      "Bot added"
    );
    Ok(report)
  }

  /// Open every feed's channels: candles, order book, trades, then
  /// ticker. Stops at the first failure; feeds created before it stay
  /// open.
  #[instrument(skip(self))]
  pub async fn create(&self) -> Result<(), MuxError> {
    for (kind, feed) in self.controls() {
      let started = Instant::now();

      if let Err(source) = feed.create().await {
        warn!(kind = %kind, error = %source, "Feed create failed");
        return Err(MuxError::FeedRegistration { kind, source });
      }

      let elapsed = started.elapsed();
      if let Some(metrics) = &self.metrics {
        metrics.observe_create(kind, elapsed.as_secs_f64());
      }
      debug!(kind = %kind, elapsed = ?elapsed, "Feed created");
    }

    info!("All feeds created");
    Ok(())
  }

  /// Hand the authoritative bot set to every feed so each drops the
  /// channels of bots no longer present.
  pub fn clean(&self, bots: &[BotWithAccount]) {
    for (_, feed) in self.controls() {
      feed.clean_stale_channels(bots);
    }
    debug!(bots = bots.len(), "Stale channels cleaned");
  }

  /// Release the handler bindings and destroy the feeds.
  pub fn destroy(mut self) {
    self.teardown();
  }

  fn controls(&self) -> [(FeedKind, &dyn FeedControl); 4] {
    [
      (FeedKind::Candle, &self.feeds.candles as &dyn FeedControl),
      (FeedKind::Orderbook, &self.feeds.orderbook as &dyn FeedControl),
      (FeedKind::Trade, &self.feeds.trades as &dyn FeedControl),
      (FeedKind::Ticker, &self.feeds.ticker as &dyn FeedControl),
    ]
  }

  fn bind_feeds(&mut self) {
    let tx = Arc::downgrade(&self.market_tx);
    let metrics = self.metrics.as_ref();
    self.subscriptions = vec![
      (FeedKind::Candle, bind(&self.feeds.candles, &tx, metrics)),
      (FeedKind::Orderbook, bind(&self.feeds.orderbook, &tx, metrics)),
      (FeedKind::Trade, bind(&self.feeds.trades, &tx, metrics)),
      (FeedKind::Ticker, bind(&self.feeds.ticker, &tx, metrics)),
    ];
    debug!(bindings = self.subscriptions.len(), "Feed handlers bound");
  }

  fn teardown(&mut self) {
    if self.destroyed {
      return;
    }
    self.destroyed = true;

    let subscriptions = std::mem::take(&mut self.subscriptions);
    let controls = self.controls();
    for (kind, id) in subscriptions {
      if !controls[kind.index()].1.off_event(id) {
        warn!(kind = %kind, subscription = %id, "Handler binding was already released");
      }
    }

    for (_, feed) in controls {
      feed.destroy();
    }

    info!(
      subscribers = self.market_tx.receiver_count(),
      "Markets stream destroyed"
    );
  }
}

impl<F: FeedFactory> Drop for MarketsStream<F> {
  fn drop(&mut self) {
    self.teardown();
  }
}

/// Bind a handler retagging `feed`'s events onto the market channel.
fn bind<S>(
  feed: &S,
  tx: &Weak<broadcast::Sender<MarketEvent>>,
  metrics: Option<&Arc<MetricsRegistry>>,
) -> SubscriptionId
where
  S: FeedStream,
  S::Event: Into<MarketEvent>,
{
  let tx = Weak::clone(tx);
  let metrics = metrics.cloned();

  feed.on_event(Arc::new(move |event: &S::Event| {
    // Gone once the stream is destroyed or dropped.
    let Some(tx) = tx.upgrade() else {
      return;
    };

    let market_event: MarketEvent = event.clone().into();
    if let Some(metrics) = &metrics {
      metrics.record_event(market_event.kind());
    }
    trace!(
      event = market_event.type_name(),
      market = %market_event.market_id(),
      "Publishing market event"
    );
    // Err only means no receiver is subscribed right now.
    let _ = tx.send(market_event);
  }))
}
