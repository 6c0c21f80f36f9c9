//! Strategy watch declarations.
//!
//! A strategy template declares, per feed kind, which markets it wants
//! to watch. `get_watchers` resolves those declarations against a
//! concrete bot into market lists.

use serde::{Deserialize, Serialize};

use super::bot::{BotWithAccount, MarketId};
use super::event::FeedKind;

/// What a strategy watches on one feed kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchDeclaration {
    /// Not watched.
    #[default]
    None,
    /// The market the bot itself trades.
    BotMarket,
    /// A fixed list of markets.
    Markets(Vec<MarketId>),
}

impl WatchDeclaration {
    fn resolve(&self, bot: &BotWithAccount) -> Vec<MarketId> {
        match self {
            Self::None => Vec::new(),
            Self::BotMarket => vec![bot.market_id()],
            Self::Markets(markets) => markets.clone(),
        }
    }
}

/// A registered strategy template and its watch declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    /// Template identifier bots refer to.
    pub template: String,
    #[serde(default)]
    pub watch_trades: WatchDeclaration,
    #[serde(default)]
    pub watch_orderbook: WatchDeclaration,
    #[serde(default)]
    pub watch_ticker: WatchDeclaration,
    #[serde(default)]
    pub watch_candles: WatchDeclaration,
}

/// Markets a bot watches, per feed kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchers {
    pub watch_trades: Vec<MarketId>,
    pub watch_orderbook: Vec<MarketId>,
    pub watch_ticker: Vec<MarketId>,
    pub watch_candles: Vec<MarketId>,
}

impl Watchers {
    /// Watch-list for one feed kind.
    pub fn for_kind(&self, kind: FeedKind) -> &[MarketId] {
        match kind {
            FeedKind::Candle => &self.watch_candles,
            FeedKind::Orderbook => &self.watch_orderbook,
            FeedKind::Trade => &self.watch_trades,
            FeedKind::Ticker => &self.watch_ticker,
        }
    }

    /// Feed kinds with a non-empty watch-list, in `FeedKind::ALL` order.
    pub fn kinds(&self) -> impl Iterator<Item = FeedKind> + '_ {
        FeedKind::ALL
            .into_iter()
            .filter(|kind| !self.for_kind(*kind).is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().next().is_none()
    }
}

/// Resolve a strategy's declarations for a bot. Duplicate markets are
/// collapsed, first occurrence wins.
pub fn get_watchers(strategy: &StrategyDefinition, bot: &BotWithAccount) -> Watchers {
    let resolve = |declaration: &WatchDeclaration| {
        let mut markets = declaration.resolve(bot);
        let mut seen = std::collections::HashSet::new();
        markets.retain(|market| seen.insert(market.clone()));
        markets
    };

    Watchers {
        watch_trades: resolve(&strategy.watch_trades),
        watch_orderbook: resolve(&strategy.watch_orderbook),
        watch_ticker: resolve(&strategy.watch_ticker),
        watch_candles: resolve(&strategy.watch_candles),
    }
}
