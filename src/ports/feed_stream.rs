//! Feed Stream Port - Per-kind Market Data Subscriptions
//!
//! One feed stream exists per feed kind. It owns the market-data
//! channels for the bots registered with it and pushes its
//! feed-specific event to every bound handler.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
  BotWithAccount, CandleEvent, FeedPayload, OrderbookEvent, TickerEvent, TradeEvent,
};
use crate::error::FeedError;

/// Handler invoked synchronously for every event a feed emits.
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle of one handler binding, released with `off_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
  /// Allocate a fresh, unique handle.
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl Default for SubscriptionId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for SubscriptionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Lifecycle surface shared by all feed kinds.
///
/// Object-safe so the multiplexer can drive the four feeds uniformly.
#[async_trait]
pub trait FeedControl: Send + Sync + 'static {
  /// Register a bot. Opens channels for its markets if the feed is
  /// already created.
  async fn add_bot(&self, bot: &BotWithAccount) -> Result<(), FeedError>;

  /// Open channels for every currently registered bot.
  async fn create(&self) -> Result<(), FeedError>;

  /// Drop channels of bots not present in `bots`. Must be idempotent.
  fn clean_stale_channels(&self, bots: &[BotWithAccount]);

  /// Release every channel and handler.
  fn destroy(&self);

  /// Remove a handler binding. Returns `false` if the handle is unknown.
  fn off_event(&self, id: SubscriptionId) -> bool;
}

/// A feed stream emitting one event type.
pub trait FeedStream: FeedControl {
  /// Feed-specific event.
  type Event: FeedPayload + Clone + Send + Sync + 'static;

  /// Bind a handler; it is called for every emitted event until
  /// `off_event` is called with the returned handle.
  fn on_event(&self, handler: EventHandler<Self::Event>) -> SubscriptionId;
}

/// Builds the four feed streams from an initial bot set.
pub trait FeedFactory: 'static {
  type Candles: FeedStream<Event = CandleEvent>;
  type Orderbook: FeedStream<Event = OrderbookEvent>;
  type Trades: FeedStream<Event = TradeEvent>;
  type Ticker: FeedStream<Event = TickerEvent>;

  fn candles(&self, bots: &[BotWithAccount]) -> Self::Candles;
  fn orderbook(&self, bots: &[BotWithAccount]) -> Self::Orderbook;
  fn trades(&self, bots: &[BotWithAccount]) -> Self::Trades;
  fn ticker(&self, bots: &[BotWithAccount]) -> Self::Ticker;
}

/// The four feed streams owned by one multiplexer.
pub struct FeedSet<F: FeedFactory> {
  pub candles: F::Candles,
  pub orderbook: F::Orderbook,
  pub trades: F::Trades,
  pub ticker: F::Ticker,
}

impl<F: FeedFactory> FeedSet<F> {
  /// Build all four feeds, each seeded with the full bot set.
  pub fn build(factory: &F, bots: &[BotWithAccount]) -> Self {
    Self {
      candles: factory.candles(bots),
      orderbook: factory.orderbook(bots),
      trades: factory.trades(bots),
      ticker: factory.ticker(bots),
    }
  }
}

impl<F: FeedFactory> Clone for FeedSet<F>
where
  F::Candles: Clone,
  F::Orderbook: Clone,
  F::Trades: Clone,
  F::Ticker: Clone,
{
  fn clone(&self) -> Self {
    Self {
      candles: self.candles.clone(),
      orderbook: self.orderbook.clone(),
      trades: self.trades.clone(),
      ticker: self.ticker.clone(),
    }
  }
}
