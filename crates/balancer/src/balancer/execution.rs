use std::panic::{self, AssertUnwindSafe};
use std::sync::PoisonError;
use std::time::Instant;

use tracing::{debug, error, trace};

use crate::error::CallbackFault;
use crate::queue::QueueKey;
use crate::types::{Continuation, ItemId, ItemState, TickReport};
use crate::work::{TickContext, Work};

use super::Balancer;

/// An item taken out of the queue for one run.
struct Run {
    id: ItemId,
    name: String,
    work: Box<dyn Work>,
    ctx: TickContext,
}

impl Balancer {
    /// Drive one host cycle at time `now` (seconds).
    ///
    /// Runs due items in due-time then admission order, at most
    /// `current_budget()` of them, and reschedules or retires each according
    /// to its [`Continuation`]. Due items beyond the budget stay queued for a
    /// later tick. Items admitted or rescheduled during this tick never run
    /// again in the same tick.
    pub fn tick(&self, now: f64) -> TickReport {
        let _serial = self
            .shared
            .tick_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        let time_budget = self.shared.config.time_budget();

        let (mut report, due_keys) = {
            let mut state = self.shared.lock_state();
            let now = if now.is_nan() || now < state.now {
                debug!(balancer = %self.shared.name, requested = now, current = state.now, "Tick time moved backwards, clamping");
                state.now
            } else {
                now
            };
            state.now = now;
            state.ticks += 1;
            let budget = state.budget.current();
            let due_keys = state.queue.due_keys(now, usize::MAX);
            let report = TickReport {
                tick: state.ticks,
                now,
                due: due_keys.len(),
                budget,
                ..TickReport::default()
            };
            (report, due_keys)
        };

        let mut executed_names = Vec::with_capacity(report.budget.min(due_keys.len()));
        for key in due_keys.iter().take(report.budget) {
            if report.executed > 0 {
                if let Some(limit) = time_budget {
                    if started.elapsed() >= limit {
                        break;
                    }
                }
            }

            let Some(Run { id, name, mut work, ctx }) = self.begin_run(key, report.tick, report.now) else {
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work.run(&ctx)))
                .map_err(|payload| CallbackFault::from_panic(id, &name, payload));
            report.executed += 1;
            let released = self.finish_run(id, work, outcome, &mut report);
            drop(released);
            executed_names.push(name);
        }

        let (change, current_budget, live) = {
            let mut state = self.shared.lock_state();
            // due at tick start and still waiting under the same key
            report.deferred = due_keys.iter().filter(|k| state.queue.contains(k)).count();
            let change = state
                .budget
                .observe(report.now, report.executed + report.deferred, report.executed);
            (change, state.budget.current(), state.items.len())
        };

        report.elapsed = started.elapsed();
        self.shared.with_metrics(|m| {
            for name in &executed_names {
                m.record_execution(name);
            }
            m.record_tick(&report, change, current_budget, live);
        });

        trace!(
            balancer = %self.shared.name,
            tick = report.tick,
            now = report.now,
            due = report.due,
            executed = report.executed,
            deferred = report.deferred,
            budget = report.budget,
            "Tick complete"
        );
        report
    }

    /// Take a due item out of the queue and mark it executing.
    /// `None` if it was cancelled since the tick started.
    fn begin_run(&self, key: &QueueKey, tick: u64, now: f64) -> Option<Run> {
        let mut state = self.shared.lock_state();
        let id = state.queue.remove(key)?;
        let item = state.items.get_mut(&id)?;
        let work = item.work.take()?;
        item.queue_key = None;
        item.set_state(ItemState::Executing);
        Some(Run {
            id,
            name: item.name.clone(),
            ctx: item.context(now, tick),
            work,
        })
    }

    /// Reschedule or retire an item after its callback returned.
    ///
    /// Returns the work when the item left the balancer, so the caller drops
    /// it after the state lock is released.
    fn finish_run(
        &self,
        id: ItemId,
        work: Box<dyn Work>,
        outcome: Result<Continuation, CallbackFault>,
        report: &mut TickReport,
    ) -> Option<Box<dyn Work>> {
        let now = report.now;
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;

        let Some(item) = state.items.get_mut(&id) else {
            return Some(work);
        };

        if item.state() == ItemState::Cancelled {
            debug!(balancer = %self.shared.name, item = %id, "Work item cancelled while running");
            state.items.remove(&id);
            report.cancelled_in_flight += 1;
            return Some(work);
        }

        let next_interval = match outcome {
            Err(fault) => {
                error!(balancer = %self.shared.name, item = %id, error = %fault, "Work item panicked, retiring it");
                report.faulted += 1;
                None
            }
            Ok(Continuation::Retire) => None,
            Ok(_) if !item.repeating => None,
            Ok(Continuation::Continue) => Some(item.interval),
            Ok(Continuation::ContinueAfter(secs)) if secs.is_finite() => Some(secs),
            Ok(Continuation::ContinueAfter(_)) => Some(item.interval),
        };

        let Some(next_interval) = next_interval else {
            item.finish_run(now, 0.0);
            item.set_state(ItemState::Retired);
            state.items.remove(&id);
            report.retired += 1;
            return Some(work);
        };

        item.finish_run(now, next_interval);
        match state.queue.push(item.next_due_at, id) {
            Ok(key) => {
                item.queue_key = Some(key);
                item.work = Some(work);
                item.set_state(ItemState::Scheduled);
                None
            }
            Err(full) => {
                error!(
                    balancer = %self.shared.name,
                    item = %id,
                    capacity = full.capacity,
                    "Admission queue full on reschedule, retiring item"
                );
                item.set_state(ItemState::Retired);
                state.items.remove(&id);
                report.retired += 1;
                Some(work)
            }
        }
    }
}
