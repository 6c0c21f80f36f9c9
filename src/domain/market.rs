//! Market data payloads carried by the feeds.
//!
//! Prices and sizes use `Decimal`; timestamps are Unix milliseconds
//! as delivered by the exchanges.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed OHLCV candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time (Unix ms).
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Candle open time as a UTC datetime.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// One price level of an order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookEntry {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Order book state after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orderbook {
    /// Bid levels sorted by price descending.
    pub bids: Vec<OrderbookEntry>,
    /// Ask levels sorted by price ascending.
    pub asks: Vec<OrderbookEntry>,
    /// Update time (Unix ms).
    pub timestamp: i64,
}

impl Orderbook {
    /// Best bid price, if any.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    /// Best ask price, if any.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }
}

/// Aggressor side of a public trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A public trade printed on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange trade identifier.
    pub id: String,
    pub side: TradeSide,
    pub price: Decimal,
    pub amount: Decimal,
    /// Trade time (Unix ms).
    pub timestamp: i64,
}

/// Ticker snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    /// 24h base volume.
    pub base_volume: Decimal,
    /// Snapshot time (Unix ms).
    pub timestamp: i64,
}
