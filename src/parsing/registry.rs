use std::collections::HashMap;
use std::path::Path;

use super::strategies::SsgaStrategy;
use super::CanonicalTable;
use crate::error::{IngestError, Result};

/// Converts one raw vendor file into the canonical table.
pub trait ParsingStrategy: Send + Sync {
    fn parse(&self, file_path: &Path) -> anyhow::Result<CanonicalTable>;
}

/// Adapts a plain function or closure into a [`ParsingStrategy`].
struct FnStrategy<F>(F);

impl<F> ParsingStrategy for FnStrategy<F>
where
    F: Fn(&Path) -> anyhow::Result<CanonicalTable> + Send + Sync,
{
    fn parse(&self, file_path: &Path) -> anyhow::Result<CanonicalTable> {
        (self.0)(file_path)
    }
}

/// Registry of parsing strategies keyed by the name used in the catalog
pub struct StrategyRegistry {
    strategies: HashMap<String, Box<dyn ParsingStrategy>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Create a registry with the built-in strategies
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(SsgaStrategy::NAME, Box::new(SsgaStrategy));
        registry
    }

    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Register (or replace) a strategy under `name`
    pub fn register(&mut self, name: &str, strategy: Box<dyn ParsingStrategy>) {
        self.strategies.insert(name.to_string(), strategy);
    }

    pub fn register_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&Path) -> anyhow::Result<CanonicalTable> + Send + Sync + 'static,
    {
        self.register(name, Box::new(FnStrategy(f)));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ParsingStrategy> {
        self.strategies.get(name).map(|s| s.as_ref())
    }

    /// Look up `strategy` and run it over `file_path`.
    pub fn parse(&self, strategy: &str, file_path: &Path) -> Result<CanonicalTable> {
        let parser = self
            .get(strategy)
            .ok_or_else(|| IngestError::UnknownStrategy(strategy.to_string()))?;
        parser.parse(file_path).map_err(|e| IngestError::Parse {
            strategy: strategy.to_string(),
            path: file_path.to_path_buf(),
            reason: format!("{:#}", e),
        })
    }

    /// List all registered strategy names, sorted
    pub fn list_strategies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}
