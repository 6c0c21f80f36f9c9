//! Property-Based Tests - Multiplexer Invariants
//!
//! Uses `proptest` to check that every delivered feed event is
//! republished exactly once with the matching tag, and that cleaning
//! stale channels is idempotent for arbitrary bot sets.

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;

use markets_stream::adapters::feeds::LocalFeedFactory;
use markets_stream::adapters::strategy::StrategyRegistry;
use markets_stream::domain::{
    BotWithAccount, Candle, CandleEvent, ExchangeAccount, FeedKind, MarketEvent, Orderbook,
    OrderbookEntry, OrderbookEvent, StrategyDefinition, Ticker, TickerEvent, Trade, TradeEvent,
    TradeSide, WatchDeclaration,
};
use markets_stream::ports::strategy::StrategyResolver;
use markets_stream::usecases::{MarketsStream, StreamOptions};

const SYMBOLS: [&str; 3] = ["BTC/USDT", "ETH/USDT", "SOL/USDT"];
const TEMPLATES: [&str; 3] = ["everything", "books", "quiet"];

fn registry() -> Arc<dyn StrategyResolver> {
    Arc::new(StrategyRegistry::new([
        StrategyDefinition {
            template: "everything".to_string(),
            watch_trades: WatchDeclaration::BotMarket,
            watch_orderbook: WatchDeclaration::BotMarket,
            watch_ticker: WatchDeclaration::BotMarket,
            watch_candles: WatchDeclaration::BotMarket,
        },
        StrategyDefinition {
            template: "books".to_string(),
            watch_trades: WatchDeclaration::None,
            watch_orderbook: WatchDeclaration::BotMarket,
            watch_ticker: WatchDeclaration::Markets(vec!["OKX:BTC/USDT".to_string()]),
            watch_candles: WatchDeclaration::None,
        },
        StrategyDefinition {
            template: "quiet".to_string(),
            watch_trades: WatchDeclaration::None,
            watch_orderbook: WatchDeclaration::None,
            watch_ticker: WatchDeclaration::None,
            watch_candles: WatchDeclaration::None,
        },
    ]))
}

fn bot(id: i64, template: &str, symbol: &str) -> BotWithAccount {
    BotWithAccount {
        id,
        name: format!("bot-{id}"),
        template: template.to_string(),
        symbol: symbol.to_string(),
        enabled: true,
        timeframe: None,
        settings: serde_json::Value::Null,
        exchange_account: ExchangeAccount {
            id: 1,
            exchange_code: "BINANCE".to_string(),
            label: String::new(),
        },
    }
}

fn stream(bots: &[BotWithAccount]) -> MarketsStream<LocalFeedFactory> {
    let strategies = registry();
    let factory = LocalFeedFactory::new(Arc::clone(&strategies));
    MarketsStream::new(&factory, bots, strategies, StreamOptions::default())
}

fn price() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000).prop_map(|n| Decimal::new(n, 2))
}

fn arb_bots() -> impl Strategy<Value = Vec<BotWithAccount>> {
    prop::collection::vec((0usize..TEMPLATES.len(), 0usize..SYMBOLS.len()), 0..8).prop_map(
        |specs| {
            (1i64..)
                .zip(specs)
                .map(|(id, (t, s))| bot(id, TEMPLATES[t], SYMBOLS[s]))
                .collect()
        },
    )
}

/// One feed event for a random kind and market.
#[derive(Debug, Clone)]
enum FeedInput {
    Candle(CandleEvent),
    Orderbook(OrderbookEvent),
    Trade(TradeEvent),
    Ticker(TickerEvent),
}

impl FeedInput {
    fn kind(&self) -> FeedKind {
        match self {
            Self::Candle(_) => FeedKind::Candle,
            Self::Orderbook(_) => FeedKind::Orderbook,
            Self::Trade(_) => FeedKind::Trade,
            Self::Ticker(_) => FeedKind::Ticker,
        }
    }

    fn expected(&self) -> MarketEvent {
        match self.clone() {
            Self::Candle(e) => e.into(),
            Self::Orderbook(e) => e.into(),
            Self::Trade(e) => e.into(),
            Self::Ticker(e) => e.into(),
        }
    }
}

fn arb_input() -> impl Strategy<Value = FeedInput> {
    let market = (0usize..SYMBOLS.len()).prop_map(|s| format!("BINANCE:{}", SYMBOLS[s]));

    prop_oneof![
        (market.clone(), price(), 0i64..1_000_000).prop_map(|(market_id, close, ts)| {
            let candle = Candle {
                timestamp: ts,
                open: close,
                high: close,
                low: close,
                close,
                volume: Decimal::ONE,
            };
            FeedInput::Candle(CandleEvent {
                candle: candle.clone(),
                history: vec![candle],
                market_id,
            })
        }),
        (market.clone(), price(), price()).prop_map(|(market_id, bid, ask)| {
            FeedInput::Orderbook(OrderbookEvent {
                orderbook: Orderbook {
                    bids: vec![OrderbookEntry { price: bid, quantity: Decimal::ONE }],
                    asks: vec![OrderbookEntry { price: ask, quantity: Decimal::ONE }],
                    timestamp: 0,
                },
                market_id,
            })
        }),
        (market.clone(), price(), any::<bool>()).prop_map(|(market_id, price, buy)| {
            FeedInput::Trade(TradeEvent {
                trade: Trade {
                    id: "t".to_string(),
                    side: if buy { TradeSide::Buy } else { TradeSide::Sell },
                    price,
                    amount: Decimal::ONE,
                    timestamp: 0,
                },
                market_id,
            })
        }),
        (market, price()).prop_map(|(market_id, last)| {
            FeedInput::Ticker(TickerEvent {
                ticker: Ticker {
                    bid: last,
                    ask: last,
                    last,
                    base_volume: Decimal::ZERO,
                    timestamp: 0,
                },
                market_id,
            })
        }),
    ]
}

fn publish(stream: &MarketsStream<LocalFeedFactory>, input: FeedInput) -> bool {
    let feeds = stream.feeds();
    match input {
        FeedInput::Candle(e) => feeds.candles.publish(e),
        FeedInput::Orderbook(e) => feeds.orderbook.publish(e),
        FeedInput::Trade(e) => feeds.trades.publish(e),
        FeedInput::Ticker(e) => feeds.ticker.publish(e),
    }
}

proptest! {
    /// Every delivered feed event appears exactly once, unchanged and
    /// in publish order; undelivered ones never appear.
    #[test]
    fn delivered_events_are_republished_once(
        bots in arb_bots(),
        inputs in prop::collection::vec(arb_input(), 0..40),
    ) {
        let stream = stream(&bots);
        let mut rx = stream.subscribe();
        tokio_test::block_on(stream.create()).unwrap();

        let mut expected = Vec::new();
        for input in inputs {
            let event = input.expected();
            if publish(&stream, input) {
                expected.push(event);
            }
        }

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        prop_assert_eq!(received, expected);
    }

    /// The tag of a normalized event always names its source kind.
    #[test]
    fn tag_matches_source_kind(input in arb_input()) {
        let kind = input.kind();
        let event = input.expected();
        prop_assert_eq!(event.kind(), kind);

        let json = serde_json::to_value(&event).unwrap();
        prop_assert_eq!(json["type"].as_str(), Some(event.type_name()));
        prop_assert_eq!(json["marketId"].as_str(), Some(event.market_id().as_str()));
    }

    /// Cleaning twice with the same bot set leaves the same channels
    /// as cleaning once.
    #[test]
    fn clean_is_idempotent(bots in arb_bots(), keep in prop::collection::vec(any::<bool>(), 8)) {
        let stream = stream(&bots);
        let kept: Vec<BotWithAccount> = bots
            .iter()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|(bot, _)| bot.clone())
            .collect();

        stream.clean(&kept);
        let once = (
            stream.feeds().candles.markets(),
            stream.feeds().orderbook.markets(),
            stream.feeds().trades.markets(),
            stream.feeds().ticker.markets(),
        );

        stream.clean(&kept);
        let twice = (
            stream.feeds().candles.markets(),
            stream.feeds().orderbook.markets(),
            stream.feeds().trades.markets(),
            stream.feeds().ticker.markets(),
        );
        prop_assert_eq!(once, twice);

        for market in stream.feeds().orderbook.markets() {
            for id in stream.feeds().orderbook.bots_for(&market) {
                prop_assert!(kept.iter().any(|bot| bot.id == id));
            }
        }
    }
}
