//! Bot and exchange account records.
//!
//! A bot is owned by an external registry (config file, database).
//! The multiplexer only borrows these records to decide which feeds a
//! bot needs and to hand them to the feed streams.

use serde::{Deserialize, Serialize};

/// Market identifier in the form `EXCHANGE:SYMBOL` (e.g. `BINANCE:BTC/USDT`).
pub type MarketId = String;

/// Bot identifier as assigned by the bot registry.
pub type BotId = i64;

/// Build a market identifier from an exchange code and a symbol.
pub fn market_id(exchange_code: &str, symbol: &str) -> MarketId {
    format!("{exchange_code}:{symbol}")
}

/// Exchange account a bot trades on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeAccount {
    /// Account identifier.
    pub id: i64,
    /// Exchange code (e.g. `BINANCE`, `OKX`).
    pub exchange_code: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
}

/// A trading bot together with its exchange account binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotWithAccount {
    /// Bot identifier.
    pub id: BotId,
    /// Human-readable bot name.
    pub name: String,
    /// Strategy template identifier (e.g. `grid`, `rsi`).
    pub template: String,
    /// Traded symbol on the exchange (e.g. `BTC/USDT`).
    pub symbol: String,
    /// Whether the bot is running.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Candle timeframe the strategy runs on, if any (e.g. `1m`).
    #[serde(default)]
    pub timeframe: Option<String>,
    /// Strategy-specific settings, opaque to the multiplexer.
    #[serde(default)]
    pub settings: serde_json::Value,
    /// Exchange account the bot is bound to.
    pub exchange_account: ExchangeAccount,
}

fn default_enabled() -> bool {
    true
}

impl BotWithAccount {
    /// The market this bot trades on.
    pub fn market_id(&self) -> MarketId {
        market_id(&self.exchange_account.exchange_code, &self.symbol)
    }
}
