//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Strategy
//! templates and the bot registry live here too, so a config reload
//! is how bots are added and removed at runtime.

pub mod hot_reload;
pub mod loader;

use serde::Deserialize;

use crate::domain::{BotWithAccount, StrategyDefinition};

/// Top-level service configuration.
///
/// Loaded from `config.toml` at startup and on every detected change.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and event channel sizing.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Config polling.
  #[serde(default)]
  pub reload: ReloadConfig,
  /// Recorded feed events to publish after startup.
  #[serde(default)]
  pub replay: Option<ReplayConfig>,
  /// Strategy templates and their watch declarations.
  #[serde(default)]
  pub strategies: Vec<StrategyDefinition>,
  /// Bot registry.
  #[serde(default)]
  pub bots: Vec<BotWithAccount>,
}

impl AppConfig {
  /// Bots that should be fed market data.
  pub fn enabled_bots(&self) -> Vec<BotWithAccount> {
    self.bots.iter().filter(|bot| bot.enabled).cloned().collect()
  }
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Buffered market events per subscriber.
  #[serde(default = "default_channel_capacity")]
  pub market_channel_capacity: usize,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      market_channel_capacity: default_channel_capacity(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// Config hot-reload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadConfig {
  /// Seconds between config file checks.
  #[serde(default = "default_reload_interval")]
  pub interval_seconds: u64,
}

impl Default for ReloadConfig {
  fn default() -> Self {
    Self {
      interval_seconds: default_reload_interval(),
    }
  }
}

/// JSONL replay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
  /// File of recorded feed events, one JSON object per line.
  pub path: String,
  /// Delay between events in milliseconds. Zero publishes as fast as possible.
  #[serde(default)]
  pub pace_ms: u64,
}

// Default value functions for serde

fn default_name() -> String {
  "markets-stream".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_channel_capacity() -> usize {
  crate::usecases::markets_stream::DEFAULT_CAPACITY
}

fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_reload_interval() -> u64 {
  60
}
