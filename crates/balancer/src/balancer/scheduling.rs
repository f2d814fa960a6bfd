use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::BalancerError;
use crate::handle::Handle;
use crate::item::WorkItem;
use crate::types::{Continuation, ItemId, ItemState, ScheduleOptions};
use crate::work::{FnWork, StatefulWork, TickContext, Work};

use super::Balancer;

fn check_seconds(value: f64) -> Result<f64, BalancerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(BalancerError::InvalidInterval(value))
    }
}

impl Balancer {
    /// Schedule a closure every `interval` seconds (or once, if not repeating).
    ///
    /// Fails with [`BalancerError::CapacityExceeded`] when the balancer is full;
    /// the caller decides whether to retry, drop the work or run it inline.
    pub fn schedule<F>(&self, callback: F, interval: f64, repeating: bool) -> Result<Handle, BalancerError>
    where
        F: FnMut(&TickContext) -> Continuation + Send + 'static,
    {
        let options = ScheduleOptions {
            repeating,
            ..ScheduleOptions::every(interval)
        };
        self.schedule_work(FnWork::new(callback), options)
    }

    /// Schedule a step function over an explicit per-item state value.
    pub fn schedule_with_state<S, F>(
        &self,
        name: &str,
        state: S,
        step: F,
        interval: f64,
        repeating: bool,
    ) -> Result<Handle, BalancerError>
    where
        S: Send + 'static,
        F: FnMut(&mut S, &TickContext) -> Continuation + Send + 'static,
    {
        let options = ScheduleOptions {
            repeating,
            ..ScheduleOptions::every(interval)
        };
        self.schedule_work(StatefulWork::new(name, state, step), options)
    }

    /// Run a closure every `interval` seconds until it returns `Retire`.
    pub fn execute<F>(&self, callback: F, interval: f64) -> Result<Handle, BalancerError>
    where
        F: FnMut(&TickContext) -> Continuation + Send + 'static,
    {
        self.schedule(callback, interval, true)
    }

    /// Run a closure once, `delay` seconds from now.
    pub fn execute_once<F>(&self, callback: F, delay: f64) -> Result<Handle, BalancerError>
    where
        F: FnOnce(&TickContext) + Send + 'static,
    {
        let mut callback = Some(callback);
        let work = FnWork::named("once", move |ctx: &TickContext| {
            if let Some(f) = callback.take() {
                f(ctx);
            }
            Continuation::Retire
        });
        self.schedule_work(work, ScheduleOptions::once_after(delay))
    }

    /// Admit any [`Work`] implementation.
    pub fn schedule_work<W>(&self, work: W, options: ScheduleOptions) -> Result<Handle, BalancerError>
    where
        W: Work + 'static,
    {
        let interval = check_seconds(options.interval)?;
        let first_delay = check_seconds(options.first_delay())?;
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| work.name().to_string());
        let capacity = self.shared.config.queue_capacity;

        let mut state = self.shared.lock_state();
        if state.items.len() >= capacity {
            drop(state);
            return Err(self.reject(&name, capacity));
        }

        let id = ItemId(state.next_id);
        state.next_id += 1;
        let now = state.now;
        let mut item = WorkItem::new(id, name, Box::new(work), interval, options.repeating, now, first_delay);
        let status = Arc::clone(&item.status);

        let key = match state.queue.push(item.next_due_at, id) {
            Ok(key) => key,
            Err(full) => {
                drop(state);
                return Err(self.reject(&item.name, full.capacity));
            }
        };
        item.queue_key = Some(key);
        item.set_state(ItemState::Scheduled);
        debug!(
            balancer = %self.shared.name,
            item = %id,
            name = %item.name,
            interval,
            due_at = item.next_due_at,
            repeating = options.repeating,
            "Scheduled work item"
        );
        state.items.insert(id, item);
        drop(state);

        Ok(Handle::attached(id, status, Arc::downgrade(&self.shared)))
    }

    fn reject(&self, name: &str, capacity: usize) -> BalancerError {
        warn!(
            balancer = %self.shared.name,
            name = %name,
            capacity,
            "Balancer at capacity, rejecting work item"
        );
        self.shared.with_metrics(|m| m.rejected += 1);
        BalancerError::CapacityExceeded {
            balancer: self.shared.name.clone(),
            capacity,
        }
    }

    /// Cancel the item behind `handle`. No-op for handles of other balancers,
    /// detached handles and items that already finished.
    pub fn stop(&self, handle: &Handle) {
        if !handle.belongs_to(&self.shared) {
            return;
        }
        if let Some(id) = handle.id() {
            self.cancel(id);
        }
    }

    /// Cancel an item by id. Returns whether the item transitioned to `Cancelled`.
    ///
    /// A queued item is removed immediately. An item whose callback is running
    /// is marked and dropped once the callback returns.
    pub fn cancel(&self, id: ItemId) -> bool {
        let mut state = self.shared.lock_state();
        let current = match state.items.get(&id) {
            Some(item) => item.state(),
            None => return false,
        };

        match current {
            ItemState::Executing => {
                if let Some(item) = state.items.get(&id) {
                    item.set_state(ItemState::Cancelled);
                }
                drop(state);
            }
            ItemState::Pending | ItemState::Scheduled => {
                let removed = state.items.remove(&id);
                if let Some(item) = &removed {
                    if let Some(key) = item.queue_key {
                        state.queue.remove(&key);
                    }
                    item.set_state(ItemState::Cancelled);
                }
                // the work is dropped after the lock is released
                drop(state);
                drop(removed);
            }
            ItemState::Retired | ItemState::Cancelled => return false,
        }

        self.record_cancel(id, current);
        true
    }

    fn record_cancel(&self, id: ItemId, from: ItemState) {
        debug!(balancer = %self.shared.name, item = %id, from = ?from, "Cancelled work item");
        self.shared.with_metrics(|m| m.cancelled += 1);
    }
}
