//! Strategy registry and fallback ordering

use crate::strategy::{RenderStrategy, StrategyInfo};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registered rendering strategies, ordered for the fallback chain
pub struct StrategyRegistry {
    /// All registered strategies by name
    strategies: HashMap<String, Arc<dyn RenderStrategy>>,

    /// Strategies sorted by (priority, name), rebuilt on registration
    ordered: Vec<Arc<dyn RenderStrategy>>,
}

impl StrategyRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            strategies: HashMap::with_capacity(4),
            ordered: Vec::with_capacity(4),
        }
    }

    /// Register a strategy, replacing any previous one with the same name
    pub fn register(&mut self, strategy: Arc<dyn RenderStrategy>) {
        let name = strategy.name().to_string();
        info!(
            "Registering render strategy: {} (priority {})",
            name,
            strategy.priority()
        );

        if self.strategies.insert(name.clone(), strategy).is_some() {
            debug!("Replaced existing strategy '{}'", name);
        }

        self.rebuild_order();
    }

    /// Builder-style registration
    pub fn with(mut self, strategy: Arc<dyn RenderStrategy>) -> Self {
        self.register(strategy);
        self
    }

    /// All strategies in ascending priority, ties broken by name.
    ///
    /// Pure: repeated calls with the same registered set return the same order.
    pub fn strategies(&self) -> Vec<Arc<dyn RenderStrategy>> {
        self.ordered.clone()
    }

    /// Ordered name/priority pairs
    pub fn describe(&self) -> Vec<StrategyInfo> {
        self.ordered
            .iter()
            .map(|s| StrategyInfo::of(s.as_ref()))
            .collect()
    }

    /// Get strategy by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn RenderStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    fn rebuild_order(&mut self) {
        let mut ordered: Vec<Arc<dyn RenderStrategy>> =
            self.strategies.values().map(Arc::clone).collect();
        ordered.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        self.ordered = ordered;
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.describe())
            .finish()
    }
}
