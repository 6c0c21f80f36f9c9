//! Error types surfaced by the multiplexer and its feed streams.
//!
//! Errors propagate unmodified to the caller; nothing here retries.

use crate::domain::{FeedKind, MarketId};

/// No strategy is registered under the bot's template identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no strategy registered for template `{template}`")]
pub struct StrategyResolutionError {
    /// The template that failed to resolve.
    pub template: String,
}

/// A feed stream rejected a registration or connection request.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The underlying market-data connection could not be established.
    #[error("connection to {market_id} failed: {reason}")]
    Connection { market_id: MarketId, reason: String },

    /// The feed stream was already destroyed.
    #[error("{kind} feed stream is destroyed")]
    Destroyed { kind: FeedKind },

    /// The feed could not work out which markets the bot needs.
    #[error(transparent)]
    Strategy(#[from] StrategyResolutionError),
}

/// Errors returned by `MarketsStream` operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Strategy lookup failed while adding a bot.
    #[error("strategy resolution failed: {0}")]
    Strategy(#[from] StrategyResolutionError),

    /// A feed stream rejected `add_bot` or `create`.
    #[error("{kind} feed registration failed: {source}")]
    FeedRegistration {
        kind: FeedKind,
        #[source]
        source: FeedError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MuxError::from(StrategyResolutionError {
            template: "ghost".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "strategy resolution failed: no strategy registered for template `ghost`"
        );

        let err = MuxError::FeedRegistration {
            kind: FeedKind::Ticker,
            source: FeedError::Destroyed { kind: FeedKind::Ticker },
        };
        assert_eq!(
            err.to_string(),
            "ticker feed registration failed: ticker feed stream is destroyed"
        );
    }

    #[test]
    fn test_registration_error_keeps_source() {
        use std::error::Error as _;

        let err = MuxError::FeedRegistration {
            kind: FeedKind::Candle,
            source: FeedError::Connection {
                market_id: "BINANCE:BTC/USDT".to_string(),
                reason: "timeout".to_string(),
            },
        };
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "connection to BINANCE:BTC/USDT failed: timeout");
    }
}
