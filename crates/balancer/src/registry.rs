//! Explicitly constructed set of named balancers.
//!
//! The registry is the composition root for scheduling: it is built once at
//! startup, in a fixed order, and handed by reference to every subsystem that
//! needs a balancer. Nothing is lazily initialized.

use indexmap::IndexMap;
use tracing::info;

use crate::balancer::Balancer;
use crate::config::{BalancerConfig, RegistryConfig};
use crate::error::BalancerError;
use crate::metrics::BalancerMetrics;
use crate::presets;
use crate::types::TickReport;

#[derive(Debug, Default)]
pub struct BalancerRegistry {
    balancers: IndexMap<String, Balancer>,
}

impl BalancerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every preset balancer.
    pub fn with_presets() -> Result<Self, BalancerError> {
        Self::from_config(&RegistryConfig::presets())
    }

    /// Build every balancer in config order.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, BalancerError> {
        let mut registry = Self::new();
        for (name, cfg) in &config.balancers {
            registry.register(name, cfg.clone())?;
        }
        info!(balancers = registry.len(), "Balancer registry built");
        Ok(registry)
    }

    /// Create and add a balancer. Names are unique.
    pub fn register(&mut self, name: &str, config: BalancerConfig) -> Result<Balancer, BalancerError> {
        if self.balancers.contains_key(name) {
            return Err(BalancerError::DuplicateBalancer(name.to_string()));
        }
        let balancer = Balancer::new(name, config)?;
        self.balancers.insert(name.to_string(), balancer.clone());
        Ok(balancer)
    }

    pub fn get(&self, name: &str) -> Option<&Balancer> {
        self.balancers.get(name)
    }

    /// The `default` balancer, if registered.
    pub fn default_balancer(&self) -> Option<&Balancer> {
        self.get(presets::DEFAULT)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.balancers.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Balancer)> {
        self.balancers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.balancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balancers.is_empty()
    }

    /// Tick every balancer at `now`, in registration order.
    pub fn tick_all(&self, now: f64) -> Vec<(String, TickReport)> {
        self.balancers
            .iter()
            .map(|(name, b)| (name.clone(), b.tick(now)))
            .collect()
    }

    /// Metrics snapshot per balancer, in registration order.
    pub fn metrics(&self) -> IndexMap<String, BalancerMetrics> {
        self.balancers
            .iter()
            .map(|(name, b)| (name.clone(), b.metrics()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Continuation;

    #[test]
    fn presets_registered_in_order() {
        let registry = BalancerRegistry::with_presets().unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["default", "steering", "navigation", "ai"]);
        assert_eq!(registry.default_balancer().unwrap().config().base_budget, 20);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut registry = BalancerRegistry::new();
        registry.register("scan", BalancerConfig::new(1, 1.0, 10, 1)).unwrap();
        let err = registry
            .register("scan", BalancerConfig::new(2, 1.0, 10, 1))
            .unwrap_err();
        assert!(matches!(err, BalancerError::DuplicateBalancer(ref n) if n == "scan"));
        assert_eq!(registry.get("scan").unwrap().config().base_budget, 1);
    }

    #[test]
    fn registered_balancer_is_shared() {
        let mut registry = BalancerRegistry::new();
        let returned = registry.register("ai", BalancerConfig::new(1, 1.0, 10, 1)).unwrap();
        assert!(returned.ptr_eq(registry.get("ai").unwrap()));
    }

    #[test]
    fn workloads_do_not_share_queues() {
        let mut registry = BalancerRegistry::new();
        let scan = registry.register("scan", BalancerConfig::new(1, 1.0, 2, 1)).unwrap();
        let ai = registry.register("ai", BalancerConfig::new(1, 1.0, 2, 1)).unwrap();

        scan.schedule(|_| Continuation::Continue, 0.0, true).unwrap();
        scan.schedule(|_| Continuation::Continue, 0.0, true).unwrap();
        assert!(scan.schedule(|_| Continuation::Continue, 0.0, true).is_err());
        assert!(ai.schedule(|_| Continuation::Continue, 0.0, true).is_ok());

        let reports = registry.tick_all(0.0);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, "scan");
        assert_eq!(reports[0].1.executed, 1);
        assert_eq!(reports[0].1.deferred, 1);
        assert_eq!(reports[1].1.executed, 1);
        assert_eq!(registry.metrics()["scan"].rejected, 1);
    }

    #[test]
    fn invalid_config_fails_whole_build() {
        let mut config = RegistryConfig::presets();
        config
            .balancers
            .insert("broken".into(), BalancerConfig::new(0, 1.0, 10, 1));
        assert!(BalancerRegistry::from_config(&config).is_err());
    }
}
