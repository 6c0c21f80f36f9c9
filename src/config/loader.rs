//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    strategies = config.strategies.len(),
    bots = config.bots.len(),
    enabled = config.enabled_bots().len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive channel capacity and reload interval
/// - Unique strategy templates and bot ids
/// - Bots referring to declared templates
/// - Non-empty symbols and exchange codes
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    config.service.market_channel_capacity > 0,
    "market_channel_capacity must be positive"
  );
  anyhow::ensure!(
    config.reload.interval_seconds > 0,
    "reload interval_seconds must be positive"
  );

  // Strategy validation
  let mut templates = HashSet::new();
  for strategy in &config.strategies {
    anyhow::ensure!(
      !strategy.template.is_empty(),
      "Strategy template name must not be empty"
    );
    anyhow::ensure!(
      templates.insert(strategy.template.as_str()),
      "Strategy template {} declared twice",
      strategy.template
    );
  }

  // Bot validation
  let mut ids = HashSet::new();
  for bot in &config.bots {
    anyhow::ensure!(ids.insert(bot.id), "Bot id {} declared twice", bot.id);
    anyhow::ensure!(
      templates.contains(bot.template.as_str()),
      "Bot {} ({}) uses unknown template {}",
      bot.id,
      bot.name,
      bot.template
    );
    anyhow::ensure!(
      !bot.symbol.is_empty(),
      "Bot {} ({}) has empty symbol",
      bot.id,
      bot.name
    );
    anyhow::ensure!(
      !bot.exchange_account.exchange_code.is_empty(),
      "Bot {} ({}) has empty exchange_code",
      bot.id,
      bot.name
    );
  }

  Ok(())
}
