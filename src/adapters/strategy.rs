//! Strategy Registry - In-memory Template Lookup
//!
//! Implements the `StrategyResolver` port from strategy definitions
//! declared in `config.toml`. The definitions can be swapped at runtime
//! when the configuration is reloaded.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::domain::StrategyDefinition;
use crate::error::StrategyResolutionError;
use crate::ports::strategy::StrategyResolver;

/// Strategy definitions keyed by template identifier.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, StrategyDefinition>>,
}

impl StrategyRegistry {
    /// Build a registry. A later definition replaces an earlier one with
    /// the same template.
    pub fn new(definitions: impl IntoIterator<Item = StrategyDefinition>) -> Self {
        Self {
            strategies: RwLock::new(index(definitions)),
        }
    }

    /// Replace every definition.
    pub fn replace(&self, definitions: impl IntoIterator<Item = StrategyDefinition>) {
        let next = index(definitions);
        let count = next.len();
        *self.strategies.write().unwrap_or_else(PoisonError::into_inner) = next;
        info!(strategies = count, "Strategy registry reloaded");
    }

    /// Registered templates, sorted.
    pub fn templates(&self) -> Vec<String> {
        let mut templates: Vec<_> = self
            .strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        templates.sort();
        templates
    }

    pub fn len(&self) -> usize {
        self.strategies.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn index(definitions: impl IntoIterator<Item = StrategyDefinition>) -> HashMap<String, StrategyDefinition> {
    definitions
        .into_iter()
        .map(|definition| (definition.template.clone(), definition))
        .collect()
}

impl StrategyResolver for StrategyRegistry {
    fn find_strategy(&self, template: &str) -> Result<StrategyDefinition, StrategyResolutionError> {
        self.strategies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(template)
            .cloned()
            .ok_or_else(|| StrategyResolutionError {
                template: template.to_string(),
            })
    }
}
