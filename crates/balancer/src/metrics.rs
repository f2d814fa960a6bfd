use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::budget::BudgetChange;
use crate::types::TickReport;

/// Balancer operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BalancerMetrics {
    /// Ticks driven so far.
    pub ticks: u64,
    /// Callback invocations across all ticks.
    pub items_executed: u64,
    /// Callback invocations by item name.
    pub executions_by_name: HashMap<String, u64>,
    /// Callbacks that panicked.
    pub faults: u64,
    /// Items that reached `Retired`.
    pub retired: u64,
    /// Items that reached `Cancelled`.
    pub cancelled: u64,
    /// `schedule` calls rejected with `CapacityExceeded`.
    pub rejected: u64,
    /// Budget when there is no backlog.
    pub base_budget: usize,
    /// Budget after adaptive growth.
    pub current_budget: usize,
    /// Live items after the last tick.
    pub queue_len: usize,
    /// Due items deferred by the last tick.
    pub last_deferred: usize,
    /// Number of budget growth steps.
    pub budget_growths: u64,
    /// Number of budget decay steps.
    pub budget_decays: u64,
    /// Mean wall-clock duration of a tick.
    pub avg_tick_duration: Duration,
    /// Host time of the last tick, in seconds.
    pub last_tick_now: f64,
    /// Wall-clock time of the last tick.
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl BalancerMetrics {
    pub fn new(base_budget: usize) -> Self {
        Self {
            base_budget,
            current_budget: base_budget,
            ..Self::default()
        }
    }

    /// Record one execution of a named item.
    pub fn record_execution(&mut self, name: &str) {
        self.items_executed += 1;
        *self.executions_by_name.entry(name.to_string()).or_default() += 1;
    }

    /// Record the end of a tick.
    pub fn record_tick(&mut self, report: &TickReport, change: BudgetChange, current_budget: usize, queue_len: usize) {
        self.ticks += 1;
        self.faults += report.faulted as u64;
        self.retired += report.retired as u64;
        self.last_deferred = report.deferred;
        self.current_budget = current_budget;
        self.queue_len = queue_len;
        self.last_tick_now = report.now;
        self.last_tick_at = Some(Utc::now());
        match change {
            BudgetChange::Grew { .. } => self.budget_growths += 1,
            BudgetChange::Decayed { .. } => self.budget_decays += 1,
            BudgetChange::Unchanged => {}
        }

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_tick_duration = if self.ticks == 1 {
            report.elapsed
        } else {
            let prev_nanos = self.avg_tick_duration.as_nanos() as f64;
            let cur_nanos = report.elapsed.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.ticks as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(elapsed_ms: u64, faulted: usize, retired: usize, deferred: usize) -> TickReport {
        TickReport {
            tick: 1,
            now: 1.5,
            faulted,
            retired,
            deferred,
            elapsed: Duration::from_millis(elapsed_ms),
            ..TickReport::default()
        }
    }

    #[test]
    fn record_executions_by_name() {
        let mut m = BalancerMetrics::new(4);
        m.record_execution("scan");
        m.record_execution("scan");
        m.record_execution("ai");

        assert_eq!(m.items_executed, 3);
        assert_eq!(m.executions_by_name["scan"], 2);
        assert_eq!(m.executions_by_name["ai"], 1);
    }

    #[test]
    fn record_tick_averages_duration() {
        let mut m = BalancerMetrics::new(1);
        m.record_tick(&report(100, 0, 0, 0), BudgetChange::Unchanged, 1, 0);
        m.record_tick(&report(200, 1, 2, 3), BudgetChange::Grew { from: 1, to: 2 }, 2, 5);

        assert_eq!(m.ticks, 2);
        assert_eq!(m.faults, 1);
        assert_eq!(m.retired, 2);
        assert_eq!(m.last_deferred, 3);
        assert_eq!(m.current_budget, 2);
        assert_eq!(m.queue_len, 5);
        assert_eq!(m.budget_growths, 1);
        assert_eq!(m.last_tick_now, 1.5);
        assert!(m.last_tick_at.is_some());
        let avg = m.avg_tick_duration.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn default_metrics() {
        let m = BalancerMetrics::new(20);
        assert_eq!(m.base_budget, 20);
        assert_eq!(m.current_budget, 20);
        assert_eq!(m.ticks, 0);
        assert!(m.executions_by_name.is_empty());
    }
}
