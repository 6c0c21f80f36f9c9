//! Market Data Feed Adapters
//!
//! Provides the in-process implementation of the feed stream port:
//! - Event Bus: token-based handler registry with synchronous emit
//! - Local Feed: per-kind channel bookkeeping and event delivery
//! - Replay: publishes recorded feed events from JSONL files

pub mod bus;
pub mod local;
pub mod replay;

pub use bus::EventBus;
pub use local::{LocalFeed, LocalFeedFactory};
pub use replay::{replay_file, RecordedFeedEvent, ReplayStats};
