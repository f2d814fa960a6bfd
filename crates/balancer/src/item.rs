use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::queue::QueueKey;
use crate::types::{ItemId, ItemState};
use crate::work::{TickContext, Work};

/// Lifecycle state shared between a work item and its handles.
///
/// Only the owning balancer writes it, while holding its state lock.
/// Handles read it to answer state queries after the item is gone.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) fn new(state: ItemState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn get(&self) -> ItemState {
        ItemState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ItemState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// One scheduled unit of work, owned by its balancer.
pub(crate) struct WorkItem {
    pub(crate) id: ItemId,
    pub(crate) name: String,
    /// `None` while the callback is running outside the state lock.
    pub(crate) work: Option<Box<dyn Work>>,
    pub(crate) interval: f64,
    pub(crate) repeating: bool,
    pub(crate) next_due_at: f64,
    pub(crate) scheduled_at: f64,
    pub(crate) last_run_at: Option<f64>,
    pub(crate) run_count: u64,
    /// Position in the admission queue while `Scheduled`.
    pub(crate) queue_key: Option<QueueKey>,
    pub(crate) status: Arc<StatusCell>,
}

impl WorkItem {
    pub(crate) fn new(
        id: ItemId,
        name: String,
        work: Box<dyn Work>,
        interval: f64,
        repeating: bool,
        now: f64,
        first_delay: f64,
    ) -> Self {
        Self {
            id,
            name,
            work: Some(work),
            interval,
            repeating,
            next_due_at: now + first_delay,
            scheduled_at: now,
            last_run_at: None,
            run_count: 0,
            queue_key: None,
            status: Arc::new(StatusCell::new(ItemState::Pending)),
        }
    }

    pub(crate) fn state(&self) -> ItemState {
        self.status.get()
    }

    pub(crate) fn set_state(&self, state: ItemState) {
        self.status.set(state);
    }

    /// Build the context for a run at `now`.
    pub(crate) fn context(&self, now: f64, tick: u64) -> TickContext {
        let since = self.last_run_at.unwrap_or(self.scheduled_at);
        TickContext {
            item: self.id,
            now,
            delta_time: (now - since).max(0.0),
            interval: self.interval,
            tick,
            run_count: self.run_count,
        }
    }

    /// Record a finished run and compute the next due time.
    pub(crate) fn finish_run(&mut self, now: f64, next_interval: f64) {
        self.last_run_at = Some(now);
        self.run_count += 1;
        self.next_due_at = now + next_interval.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Continuation;
    use crate::work::FnWork;

    fn item(now: f64, interval: f64) -> WorkItem {
        WorkItem::new(
            ItemId(3),
            "probe".into(),
            Box::new(FnWork::new(|_: &TickContext| Continuation::Continue)),
            interval,
            true,
            now,
            interval,
        )
    }

    #[test]
    fn new_item_is_pending_and_due_after_delay() {
        let it = item(10.0, 0.25);
        assert_eq!(it.state(), ItemState::Pending);
        assert_eq!(it.next_due_at, 10.25);
        assert!(it.work.is_some());
    }

    #[test]
    fn context_delta_tracks_last_run() {
        let mut it = item(1.0, 0.5);
        let first = it.context(2.0, 4);
        assert_eq!(first.delta_time, 1.0);
        assert_eq!(first.run_count, 0);
        assert_eq!(first.tick, 4);

        it.finish_run(2.0, it.interval);
        assert_eq!(it.next_due_at, 2.5);
        let second = it.context(2.75, 5);
        assert_eq!(second.delta_time, 0.75);
        assert_eq!(second.run_count, 1);
    }

    #[test]
    fn negative_override_clamps_to_now() {
        let mut it = item(0.0, 1.0);
        it.finish_run(5.0, -3.0);
        assert_eq!(it.next_due_at, 5.0);
    }

    #[test]
    fn status_cell_shared_with_clones() {
        let it = item(0.0, 0.0);
        let shared = Arc::clone(&it.status);
        it.set_state(ItemState::Executing);
        assert_eq!(shared.get(), ItemState::Executing);
    }
}
