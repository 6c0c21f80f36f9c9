//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the multiplexer requires from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `FeedStream`: per-kind market data subscriptions (candle, order book, trade, ticker)
//! - `StrategyResolver`: strategy template lookup

pub mod feed_stream;
pub mod strategy;

pub use feed_stream::{EventHandler, FeedControl, FeedFactory, FeedSet, FeedStream, SubscriptionId};
pub use strategy::StrategyResolver;
