//! Adaptive per-tick execution budget.
//!
//! The budget grows by one increment for every full window of sustained
//! overflow and shrinks by one increment for every full window of calm, so it
//! never swings between base and peak in a single tick.

use tracing::info;

use crate::config::BalancerConfig;

/// Outcome of feeding one tick into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetChange {
    Unchanged,
    Grew { from: usize, to: usize },
    Decayed { from: usize, to: usize },
}

#[derive(Debug, Clone)]
pub struct BudgetController {
    base: usize,
    current: usize,
    max: usize,
    increment: usize,
    window_seconds: f64,
    overflow_threshold: f64,
    /// Start of the current run of overflowing ticks.
    overflow_since: Option<f64>,
    /// Start of the current run of calm ticks while above base.
    calm_since: Option<f64>,
}

impl BudgetController {
    pub fn new(
        base: usize,
        increment: usize,
        window_seconds: f64,
        overflow_threshold: f64,
        max: usize,
    ) -> Self {
        Self {
            base,
            current: base,
            max: max.max(base),
            increment,
            window_seconds,
            overflow_threshold,
            overflow_since: None,
            calm_since: None,
        }
    }

    pub fn from_config(config: &BalancerConfig) -> Self {
        Self::new(
            config.base_budget,
            config.growth_increment,
            config.window_seconds,
            config.overflow_threshold,
            config.resolved_max_budget(),
        )
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Whether a tick that found `due` items and ran `executed` of them overflowed.
    pub fn is_overflow(&self, due: usize, executed: usize) -> bool {
        if due == 0 || executed >= due {
            return false;
        }
        let left = (due - executed) as f64 / due as f64;
        left > self.overflow_threshold
    }

    /// Feed the result of the tick at `now` and adapt the budget.
    pub fn observe(&mut self, now: f64, due: usize, executed: usize) -> BudgetChange {
        if self.is_overflow(due, executed) {
            self.calm_since = None;
            let since = *self.overflow_since.get_or_insert(now);
            if now - since >= self.window_seconds && self.current < self.max {
                let from = self.current;
                self.current = (self.current + self.increment).min(self.max);
                self.overflow_since = Some(now);
                info!(from, to = self.current, "Budget grew under sustained backlog");
                return BudgetChange::Grew {
                    from,
                    to: self.current,
                };
            }
            return BudgetChange::Unchanged;
        }

        self.overflow_since = None;
        if self.current <= self.base {
            self.calm_since = None;
            return BudgetChange::Unchanged;
        }

        let since = *self.calm_since.get_or_insert(now);
        if now - since >= self.window_seconds {
            let from = self.current;
            self.current = self.current.saturating_sub(self.increment).max(self.base);
            self.calm_since = Some(now);
            info!(from, to = self.current, "Budget decayed after backlog cleared");
            return BudgetChange::Decayed {
                from,
                to: self.current,
            };
        }
        BudgetChange::Unchanged
    }
}
