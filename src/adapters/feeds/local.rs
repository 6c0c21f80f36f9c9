//! Local Feed Stream - In-process Channel Bookkeeping per Feed Kind
//!
//! Implements the `FeedStream` port without a network transport.
//! Tracks one channel per watched market together with the bots that
//! need it, opens channels on `create()`, and delivers events pushed
//! through `publish` to the bound handlers. Events for markets without
//! an open channel are dropped.
//!
//! Handles are cheap clones sharing one state, so a replay task can
//! publish into a feed the multiplexer owns.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::bus::EventBus;
use crate::domain::{
    get_watchers, BotId, BotWithAccount, CandleEvent, FeedKind, FeedPayload, MarketId,
    OrderbookEvent, TickerEvent, TradeEvent,
};
use crate::error::{FeedError, StrategyResolutionError};
use crate::ports::feed_stream::{
    EventHandler, FeedControl, FeedFactory, FeedStream, SubscriptionId,
};
use crate::ports::strategy::StrategyResolver;

#[derive(Debug, Default)]
struct Channel {
    bots: BTreeSet<BotId>,
    open: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    channels: BTreeMap<MarketId, Channel>,
    created: bool,
    destroyed: bool,
}

impl FeedState {
    /// Attach `bot` to each market, creating channels as needed.
    /// Returns the number of newly created channels.
    fn register(&mut self, bot: BotId, markets: &[MarketId]) -> usize {
        let open = self.created;
        let mut created = 0;
        for market in markets {
            let channel = self.channels.entry(market.clone()).or_insert_with(|| {
                created += 1;
                Channel {
                    bots: BTreeSet::new(),
                    open,
                }
            });
            channel.bots.insert(bot);
        }
        created
    }
}

struct Inner<E> {
    kind: FeedKind,
    strategies: Arc<dyn StrategyResolver>,
    bus: EventBus<E>,
    state: RwLock<FeedState>,
}

/// In-process feed stream for one feed kind.
pub struct LocalFeed<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for LocalFeed<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> LocalFeed<E>
where
    E: FeedPayload + Clone + Send + Sync + 'static,
{
    /// Build the feed and register the bots whose strategy watches
    /// this kind. Bots with an unknown template are skipped.
    pub fn new(bots: &[BotWithAccount], strategies: Arc<dyn StrategyResolver>) -> Self {
        let feed = Self {
            inner: Arc::new(Inner {
                kind: E::KIND,
                strategies,
                bus: EventBus::new(),
                state: RwLock::new(FeedState::default()),
            }),
        };

        {
            let mut state = feed.write_state();
            for bot in bots {
                match feed.markets_for(bot) {
                    Ok(markets) => {
                        state.register(bot.id, &markets);
                    }
                    Err(e) => warn!(
                        kind = %E::KIND,
                        bot_id = bot.id,
                        error = %e,
                        "Skipping bot with unresolved strategy"
                    ),
                }
            }
            debug!(
                kind = %E::KIND,
                bots = bots.len(),
                channels = state.channels.len(),
                "Local feed initialized"
            );
        }

        feed
    }

    pub fn kind(&self) -> FeedKind {
        self.inner.kind
    }

    /// Deliver an event to the bound handlers if its market has an
    /// open channel. Returns whether it was delivered.
    pub fn publish(&self, event: E) -> bool {
        let deliverable = {
            let state = self.read_state();
            !state.destroyed
                && state
                    .channels
                    .get(event.market_id())
                    .is_some_and(|channel| channel.open)
        };

        if !deliverable {
            trace!(
                kind = %self.inner.kind,
                market = %event.market_id(),
                "Dropping event for closed channel"
            );
            return false;
        }

        self.inner.bus.emit(&event);
        true
    }

    /// Markets with a channel, sorted.
    pub fn markets(&self) -> Vec<MarketId> {
        self.read_state().channels.keys().cloned().collect()
    }

    /// Bots attached to a market's channel, sorted.
    pub fn bots_for(&self, market: &str) -> Vec<BotId> {
        self.read_state()
            .channels
            .get(market)
            .map(|channel| channel.bots.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_open(&self, market: &str) -> bool {
        self.read_state()
            .channels
            .get(market)
            .is_some_and(|channel| channel.open)
    }

    pub fn is_created(&self) -> bool {
        self.read_state().created
    }

    pub fn is_destroyed(&self) -> bool {
        self.read_state().destroyed
    }

    /// Number of bound handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.bus.len()
    }

    fn markets_for(&self, bot: &BotWithAccount) -> Result<Vec<MarketId>, StrategyResolutionError> {
        let strategy = self.inner.strategies.find_strategy(&bot.template)?;
        Ok(get_watchers(&strategy, bot).for_kind(self.inner.kind).to_vec())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, FeedState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, FeedState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<E> FeedControl for LocalFeed<E>
where
    E: FeedPayload + Clone + Send + Sync + 'static,
{
    async fn add_bot(&self, bot: &BotWithAccount) -> Result<(), FeedError> {
        let markets = self.markets_for(bot)?;

        let mut state = self.write_state();
        if state.destroyed {
            return Err(FeedError::Destroyed {
                kind: self.inner.kind,
            });
        }
        let created = state.register(bot.id, &markets);

        debug!(
            kind = %self.inner.kind,
            bot_id = bot.id,
            markets = markets.len(),
            new_channels = created,
            "Bot registered"
        );
        Ok(())
    }

    async fn create(&self) -> Result<(), FeedError> {
        let mut state = self.write_state();
        if state.destroyed {
            return Err(FeedError::Destroyed {
                kind: self.inner.kind,
            });
        }

        for channel in state.channels.values_mut() {
            channel.open = true;
        }
        state.created = true;

        info!(
            kind = %self.inner.kind,
            channels = state.channels.len(),
            "Feed channels opened"
        );
        Ok(())
    }

    fn clean_stale_channels(&self, bots: &[BotWithAccount]) {
        let desired: HashMap<BotId, Vec<MarketId>> = bots
            .iter()
            .filter_map(|bot| self.markets_for(bot).ok().map(|markets| (bot.id, markets)))
            .collect();

        let mut state = self.write_state();
        let before = state.channels.len();
        state.channels.retain(|market, channel| {
            channel
                .bots
                .retain(|bot| desired.get(bot).is_some_and(|markets| markets.contains(market)));
            !channel.bots.is_empty()
        });
        let removed = before - state.channels.len();

        if removed > 0 {
            info!(
                kind = %self.inner.kind,
                removed,
                remaining = state.channels.len(),
                "Stale channels removed"
            );
        }
    }

    fn destroy(&self) {
        self.inner.bus.clear();

        let mut state = self.write_state();
        state.channels.clear();
        state.created = false;
        state.destroyed = true;

        info!(kind = %self.inner.kind, "Feed destroyed");
    }

    fn off_event(&self, id: SubscriptionId) -> bool {
        self.inner.bus.off(id)
    }
}

impl<E> FeedStream for LocalFeed<E>
where
    E: FeedPayload + Clone + Send + Sync + 'static,
{
    type Event = E;

    fn on_event(&self, handler: EventHandler<E>) -> SubscriptionId {
        self.inner.bus.on(handler)
    }
}

/// Builds the four local feeds from a shared strategy resolver.
pub struct LocalFeedFactory {
    strategies: Arc<dyn StrategyResolver>,
}

impl LocalFeedFactory {
    pub fn new(strategies: Arc<dyn StrategyResolver>) -> Self {
        Self { strategies }
    }
}

impl FeedFactory for LocalFeedFactory {
    type Candles = LocalFeed<CandleEvent>;
    type Orderbook = LocalFeed<OrderbookEvent>;
    type Trades = LocalFeed<TradeEvent>;
    type Ticker = LocalFeed<TickerEvent>;

    fn candles(&self, bots: &[BotWithAccount]) -> Self::Candles {
        LocalFeed::new(bots, Arc::clone(&self.strategies))
    }

    fn orderbook(&self, bots: &[BotWithAccount]) -> Self::Orderbook {
        LocalFeed::new(bots, Arc::clone(&self.strategies))
    }

    fn trades(&self, bots: &[BotWithAccount]) -> Self::Trades {
        LocalFeed::new(bots, Arc::clone(&self.strategies))
    }

    fn ticker(&self, bots: &[BotWithAccount]) -> Self::Ticker {
        LocalFeed::new(bots, Arc::clone(&self.strategies))
    }
}
