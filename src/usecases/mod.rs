//! Use Cases Layer - Application Logic
//!
//! Orchestrates domain logic with port interfaces. Each use case is a
//! self-contained operation.
//!
//! Use cases:
//! - `MarketsStream`: fan-in of the four feed kinds into one event stream
//! - `BotReconciler`: keeps the registered bots in step with the bot registry

pub mod markets_stream;
pub mod reconciler;

pub use markets_stream::{
    MarketsStream, Registration, RegistrationReport, StreamOptions, DEFAULT_CAPACITY,
};
pub use reconciler::{BotReconciler, ReconcileSummary};
