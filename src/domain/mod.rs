//! Domain layer - market data, bots and strategy declarations.
//!
//! Pure types and functions with no I/O. Everything here is
//! serializable and testable in isolation.

pub mod bot;
pub mod event;
pub mod market;
pub mod strategy;

pub use bot::{market_id, BotId, BotWithAccount, ExchangeAccount, MarketId};
pub use event::{
    CandleEvent, FeedKind, FeedPayload, MarketEvent, OrderbookEvent, TickerEvent, TradeEvent,
};
pub use market::{Candle, Orderbook, OrderbookEntry, Ticker, Trade, TradeSide};
pub use strategy::{get_watchers, StrategyDefinition, WatchDeclaration, Watchers};
