//! Balancer and registry configuration, typically parsed from TOML.
//!
//! ```toml
//! [balancers.default]
//! base_budget = 20
//! window_seconds = 1.0
//! queue_capacity = 200
//! growth_increment = 4
//!
//! [balancers.ai]
//! base_budget = 5
//! window_seconds = 2.0
//! queue_capacity = 100
//! growth_increment = 1
//! time_budget_ms = 2.0
//! ```
//!
//! Every field can be overridden per balancer with
//! `FRAMEBAL_<NAME>_<FIELD>` environment variables, e.g.
//! `FRAMEBAL_AI_BASE_BUDGET=8`.

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BalancerError;
use crate::presets;

/// Configuration of one balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Items executed per tick when there is no backlog.
    #[serde(default = "default_base_budget")]
    pub base_budget: usize,
    /// Seconds of sustained overflow before growing, and of calm before decaying.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,
    /// Maximum number of live items.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Budget change applied per window.
    #[serde(default = "default_growth_increment")]
    pub growth_increment: usize,
    /// Fraction of due items left behind above which a tick counts as overflow.
    #[serde(default)]
    pub overflow_threshold: f64,
    /// Upper bound for budget growth. Defaults to `queue_capacity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_budget: Option<usize>,
    /// Optional wall-clock allowance per tick, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<f64>,
}

fn default_base_budget() -> usize {
    20
}

fn default_window_seconds() -> f64 {
    1.0
}

fn default_queue_capacity() -> usize {
    200
}

fn default_growth_increment() -> usize {
    4
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            base_budget: default_base_budget(),
            window_seconds: default_window_seconds(),
            queue_capacity: default_queue_capacity(),
            growth_increment: default_growth_increment(),
            overflow_threshold: 0.0,
            max_budget: None,
            time_budget_ms: None,
        }
    }
}

impl BalancerConfig {
    /// Build from the four-value tuple used across the product:
    /// base budget, window seconds, queue capacity, growth increment.
    pub fn new(base_budget: usize, window_seconds: f64, queue_capacity: usize, growth_increment: usize) -> Self {
        Self {
            base_budget,
            window_seconds,
            queue_capacity,
            growth_increment,
            ..Self::default()
        }
    }

    pub fn with_time_budget_ms(mut self, ms: f64) -> Self {
        self.time_budget_ms = Some(ms);
        self
    }

    pub fn with_max_budget(mut self, max: usize) -> Self {
        self.max_budget = Some(max);
        self
    }

    pub fn with_overflow_threshold(mut self, threshold: f64) -> Self {
        self.overflow_threshold = threshold;
        self
    }

    /// Budget ceiling: `max_budget` if set, otherwise the queue capacity.
    pub fn resolved_max_budget(&self) -> usize {
        self.max_budget
            .unwrap_or(self.queue_capacity)
            .max(self.base_budget)
    }

    /// `time_budget_ms` as a `Duration`. `None` when unset or not representable.
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
    }

    pub fn validate(&self) -> Result<(), BalancerError> {
        if self.base_budget == 0 {
            return Err(BalancerError::Config("base_budget must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(BalancerError::Config("queue_capacity must be at least 1".into()));
        }
        if self.growth_increment == 0 {
            return Err(BalancerError::Config("growth_increment must be at least 1".into()));
        }
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(BalancerError::Config(format!(
                "window_seconds must be a positive number, got {}",
                self.window_seconds
            )));
        }
        if !(0.0..1.0).contains(&self.overflow_threshold) {
            return Err(BalancerError::Config(format!(
                "overflow_threshold must be in [0, 1), got {}",
                self.overflow_threshold
            )));
        }
        if let Some(max) = self.max_budget {
            if max < self.base_budget {
                return Err(BalancerError::Config(format!(
                    "max_budget ({max}) is below base_budget ({})",
                    self.base_budget
                )));
            }
        }
        if let Some(ms) = self.time_budget_ms {
            if !ms.is_finite() || ms <= 0.0 {
                return Err(BalancerError::Config(format!(
                    "time_budget_ms must be a positive number, got {ms}"
                )));
            }
            if self.time_budget().is_none() {
                return Err(BalancerError::Config(format!(
                    "time_budget_ms is out of range, got {ms}"
                )));
            }
        }
        Ok(())
    }

    /// Apply `FRAMEBAL_<NAME>_<FIELD>` overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self, name: &str) {
        let prefix = format!("FRAMEBAL_{}", name.to_uppercase().replace('-', "_"));
        if let Some(v) = env_parse(&prefix, "BASE_BUDGET") {
            self.base_budget = v;
        }
        if let Some(v) = env_parse(&prefix, "WINDOW_SECONDS") {
            self.window_seconds = v;
        }
        if let Some(v) = env_parse(&prefix, "QUEUE_CAPACITY") {
            self.queue_capacity = v;
        }
        if let Some(v) = env_parse(&prefix, "GROWTH_INCREMENT") {
            self.growth_increment = v;
        }
        if let Some(v) = env_parse(&prefix, "OVERFLOW_THRESHOLD") {
            self.overflow_threshold = v;
        }
        if let Some(v) = env_parse(&prefix, "MAX_BUDGET") {
            self.max_budget = Some(v);
        }
        if let Some(v) = env_parse(&prefix, "TIME_BUDGET_MS") {
            self.time_budget_ms = Some(v);
        }
    }
}

fn env_parse<T: std::str::FromStr>(prefix: &str, key: &str) -> Option<T> {
    std::env::var(format!("{prefix}_{key}"))
        .ok()
        .filter(|s| !s.is_empty())
        .and_then(|v| v.parse().ok())
}

// ── Registry ────────────────────────────────────────────────────────

/// Named balancer configurations, in construction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub balancers: IndexMap<String, BalancerConfig>,
}

impl RegistryConfig {
    /// The built-in preset balancers.
    pub fn presets() -> Self {
        Self {
            balancers: presets::all()
                .into_iter()
                .map(|(name, cfg)| (name.to_string(), cfg))
                .collect(),
        }
    }

    /// Parse config from a TOML string, apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, BalancerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BalancerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, BalancerError> {
        toml::to_string_pretty(self).map_err(|e| BalancerError::Config(e.to_string()))
    }

    pub fn apply_env_overrides(&mut self) {
        for (name, cfg) in self.balancers.iter_mut() {
            cfg.apply_env_overrides(name);
        }
    }

    pub fn validate(&self) -> Result<(), BalancerError> {
        for (name, cfg) in &self.balancers {
            if name.trim().is_empty() {
                return Err(BalancerError::Config("balancer name must not be empty".into()));
            }
            cfg.validate()
                .map_err(|e| BalancerError::Config(format!("balancer '{name}': {e}")))?;
        }
        Ok(())
    }
}
