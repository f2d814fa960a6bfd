//! Named balancer configurations for the product's recurring workloads.
//!
//! Workloads with different latency and throughput needs get separate
//! balancers so that a burst in one cannot starve another.

use crate::config::BalancerConfig;

/// Ad-hoc polling and one-shot deferred calls.
pub const DEFAULT: &str = "default";
/// High-churn, cheap steering sensor scans.
pub const STEERING: &str = "steering";
/// Path re-scans and dynamic-obstacle polling.
pub const NAVIGATION: &str = "navigation";
/// Low-churn, expensive AI ticks.
pub const AI: &str = "ai";

pub fn default_balancer() -> BalancerConfig {
    BalancerConfig::new(20, 1.0, 200, 4)
}

pub fn steering() -> BalancerConfig {
    BalancerConfig::new(40, 0.5, 500, 8)
}

pub fn navigation() -> BalancerConfig {
    BalancerConfig::new(10, 1.0, 200, 2).with_time_budget_ms(4.0)
}

pub fn ai() -> BalancerConfig {
    BalancerConfig::new(5, 2.0, 100, 1)
        .with_max_budget(20)
        .with_time_budget_ms(2.0)
}

/// All presets in construction order.
pub fn all() -> Vec<(&'static str, BalancerConfig)> {
    vec![
        (DEFAULT, default_balancer()),
        (STEERING, steering()),
        (NAVIGATION, navigation()),
        (AI, ai()),
    ]
}

/// Look up a preset by name.
pub fn by_name(name: &str) -> Option<BalancerConfig> {
    all().into_iter().find(|(n, _)| *n == name).map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for (name, cfg) in all() {
            assert!(cfg.validate().is_ok(), "preset {name} should validate");
        }
    }

    #[test]
    fn default_preset_matches_observed_tuple() {
        let cfg = by_name(DEFAULT).unwrap();
        assert_eq!(cfg, BalancerConfig::new(20, 1.0, 200, 4));
    }

    #[test]
    fn unknown_preset() {
        assert!(by_name("physics").is_none());
    }
}
