//! Feed events and the normalized `MarketEvent`.
//!
//! Each feed stream emits its own event type. The multiplexer retags
//! every one of them into a single `MarketEvent` so strategy engines
//! consume one stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::bot::MarketId;
use super::market::{Candle, Orderbook, Ticker, Trade};

/// Category of market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Candle,
    Orderbook,
    Trade,
    Ticker,
}

impl FeedKind {
    /// All feed kinds, in the order feeds are created and destroyed.
    pub const ALL: [Self; 4] = [Self::Candle, Self::Orderbook, Self::Trade, Self::Ticker];

    /// Stable lowercase name, used for metric labels and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Candle => "candle",
            Self::Orderbook => "orderbook",
            Self::Trade => "trade",
            Self::Ticker => "ticker",
        }
    }

    /// Position in [`FeedKind::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Candle => 0,
            Self::Orderbook => 1,
            Self::Trade => 2,
            Self::Ticker => 3,
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of the four feed-specific events.
pub trait FeedPayload {
    /// Feed kind that emits this event.
    const KIND: FeedKind;

    /// Market the event belongs to.
    fn market_id(&self) -> &MarketId;
}

/// A candle closed. `history` holds the recent candles, oldest first,
/// including `candle` as the last element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleEvent {
    pub candle: Candle,
    pub history: Vec<Candle>,
    pub market_id: MarketId,
}

/// The order book changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookEvent {
    pub orderbook: Orderbook,
    pub market_id: MarketId,
}

/// A public trade printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade: Trade,
    pub market_id: MarketId,
}

/// The ticker changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEvent {
    pub ticker: Ticker,
    pub market_id: MarketId,
}

impl FeedPayload for CandleEvent {
    const KIND: FeedKind = FeedKind::Candle;

    fn market_id(&self) -> &MarketId {
        &self.market_id
    }
}

impl FeedPayload for OrderbookEvent {
    const KIND: FeedKind = FeedKind::Orderbook;

    fn market_id(&self) -> &MarketId {
        &self.market_id
    }
}

impl FeedPayload for TradeEvent {
    const KIND: FeedKind = FeedKind::Trade;

    fn market_id(&self) -> &MarketId {
        &self.market_id
    }
}

impl FeedPayload for TickerEvent {
    const KIND: FeedKind = FeedKind::Ticker;

    fn market_id(&self) -> &MarketId {
        &self.market_id
    }
}

/// Normalized market event published to strategy engines.
///
/// Serialized with a `type` tag (`onCandleClosed`, `onPublicTrade`,
/// `onOrderbookChange`, `onTickerChange`) and camelCase fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum MarketEvent {
    #[serde(rename = "onCandleClosed")]
    CandleClosed {
        candle: Candle,
        candles: Vec<Candle>,
        market_id: MarketId,
    },
    #[serde(rename = "onPublicTrade")]
    PublicTrade { trade: Trade, market_id: MarketId },
    #[serde(rename = "onOrderbookChange")]
    OrderbookChange {
        orderbook: Orderbook,
        market_id: MarketId,
    },
    #[serde(rename = "onTickerChange")]
    TickerChange { ticker: Ticker, market_id: MarketId },
}

impl MarketEvent {
    /// Wire name of the event tag.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::CandleClosed { .. } => "onCandleClosed",
            Self::PublicTrade { .. } => "onPublicTrade",
            Self::OrderbookChange { .. } => "onOrderbookChange",
            Self::TickerChange { .. } => "onTickerChange",
        }
    }

    /// Feed kind the event originated from.
    pub const fn kind(&self) -> FeedKind {
        match self {
            Self::CandleClosed { .. } => FeedKind::Candle,
            Self::PublicTrade { .. } => FeedKind::Trade,
            Self::OrderbookChange { .. } => FeedKind::Orderbook,
            Self::TickerChange { .. } => FeedKind::Ticker,
        }
    }

    pub fn market_id(&self) -> &MarketId {
        match self {
            Self::CandleClosed { market_id, .. }
            | Self::PublicTrade { market_id, .. }
            | Self::OrderbookChange { market_id, .. }
            | Self::TickerChange { market_id, .. } => market_id,
        }
    }
}

impl From<CandleEvent> for MarketEvent {
    fn from(event: CandleEvent) -> Self {
        Self::CandleClosed {
            candle: event.candle,
            candles: event.history,
            market_id: event.market_id,
        }
    }
}

impl From<TradeEvent> for MarketEvent {
    fn from(event: TradeEvent) -> Self {
        Self::PublicTrade {
            trade: event.trade,
            market_id: event.market_id,
        }
    }
}

impl From<OrderbookEvent> for MarketEvent {
    fn from(event: OrderbookEvent) -> Self {
        Self::OrderbookChange {
            orderbook: event.orderbook,
            market_id: event.market_id,
        }
    }
}

impl From<TickerEvent> for MarketEvent {
    fn from(event: TickerEvent) -> Self {
        Self::TickerChange {
            ticker: event.ticker,
            market_id: event.market_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::market::TradeSide;

    fn candle(ts: i64) -> Candle {
        Candle {
            timestamp: ts,
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(105),
            volume: dec!(12.5),
        }
    }

    #[test]
    fn test_kind_order_and_index_agree() {
        for (i, kind) in FeedKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_candle_event_history_becomes_candles() {
        let c1 = candle(1);
        let event = MarketEvent::from(CandleEvent {
            candle: c1.clone(),
            history: vec![candle(0), c1.clone()],
            market_id: "BTCUSDT".to_string(),
        });

        match &event {
            MarketEvent::CandleClosed { candle, candles, market_id } => {
                assert_eq!(candle, &c1);
                assert_eq!(candles.len(), 2);
                assert_eq!(market_id, "BTCUSDT");
            }
            other => panic!("unexpected variant {other:?}"),
        }
        assert_eq!(event.kind(), FeedKind::Candle);
        assert_eq!(event.type_name(), "onCandleClosed");
    }

    #[test]
    fn test_market_event_json_shape() {
        let event = MarketEvent::from(TradeEvent {
            trade: Trade {
                id: "t-1".to_string(),
                side: TradeSide::Buy,
                price: dec!(50000),
                amount: dec!(0.01),
                timestamp: 1,
            },
            market_id: "BINANCE:BTC/USDT".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "onPublicTrade");
        assert_eq!(json["marketId"], "BINANCE:BTC/USDT");
        assert_eq!(json["trade"]["id"], "t-1");

        let back: MarketEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_tag_matches_source_kind() {
        let ticker = MarketEvent::from(TickerEvent {
            ticker: Ticker {
                bid: dec!(1),
                ask: dec!(2),
                last: dec!(1.5),
                base_volume: dec!(0),
                timestamp: 0,
            },
            market_id: "m".to_string(),
        });
        assert_eq!(ticker.kind(), FeedKind::Ticker);
        assert_eq!(ticker.type_name(), "onTickerChange");

        let book = MarketEvent::from(OrderbookEvent {
            orderbook: Orderbook { bids: vec![], asks: vec![], timestamp: 0 },
            market_id: "m".to_string(),
        });
        assert_eq!(book.kind(), FeedKind::Orderbook);
        assert_eq!(book.market_id(), "m");
    }
}
