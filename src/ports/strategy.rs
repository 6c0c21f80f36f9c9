//! Strategy Port - Template Lookup
//!
//! Resolves a bot's template identifier to the strategy's watch
//! declarations. Turning declarations into market lists is the pure
//! `domain::strategy::get_watchers`.

use crate::domain::StrategyDefinition;
use crate::error::StrategyResolutionError;

/// Looks up strategy templates.
pub trait StrategyResolver: Send + Sync + 'static {
  /// Find the strategy registered under `template`.
  fn find_strategy(&self, template: &str) -> Result<StrategyDefinition, StrategyResolutionError>;
}
