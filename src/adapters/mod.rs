//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` and the
//! operational surfaces around the multiplexer.
//!
//! Adapter categories:
//! - `feeds`: in-process feed streams and JSONL replay
//! - `metrics`: Prometheus metrics export and health checks
//! - `strategy`: strategy template registry

pub mod feeds;
pub mod metrics;
pub mod strategy;
