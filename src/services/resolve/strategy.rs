//! Strategy trait and registry for destination descriptor forms.

use super::DescriptorKind;
use crate::Result;
use crate::services::system::{Platform, SystemProbe};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Address and (when known) copy root produced by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub address: Ipv4Addr,
    pub root: Option<PathBuf>,
}

/// Common interface implemented by every descriptor form.
pub trait ResolveStrategy {
    /// Identify the strategy for logging and diagnostics.
    fn kind(&self) -> DescriptorKind;

    /// Whether the strategy may run on `platform`.
    fn is_eligible(&self, _platform: Platform) -> bool {
        true
    }

    /// Whether `descriptor` has this strategy's form. Must not fail.
    fn accepts(&self, descriptor: &str) -> bool;

    /// Resolve an accepted descriptor.
    fn resolve(&self, descriptor: &str, system: &dyn SystemProbe) -> Result<Resolution>;
}

/// Ordered collection of strategies; the first eligible, accepting one wins.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy at the lowest priority.
    pub fn register(&mut self, strategy: Box<dyn ResolveStrategy>) {
        self.strategies.push(strategy);
    }

    #[must_use]
    pub fn select(&self, descriptor: &str, platform: Platform) -> Option<&dyn ResolveStrategy> {
        self.strategies
            .iter()
            .map(|s| &**s)
            .find(|strategy| strategy.is_eligible(platform) && strategy.accepts(descriptor))
    }

    /// Forms eligible on `platform`, in priority order.
    #[must_use]
    pub fn kinds(&self, platform: Platform) -> Vec<DescriptorKind> {
        self.strategies
            .iter()
            .filter(|s| s.is_eligible(platform))
            .map(|s| s.kind())
            .collect()
    }
}
