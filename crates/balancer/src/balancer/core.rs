use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{info, warn};

use crate::budget::BudgetController;
use crate::config::BalancerConfig;
use crate::error::BalancerError;
use crate::item::WorkItem;
use crate::metrics::BalancerMetrics;
use crate::queue::AdmissionQueue;
use crate::types::{ItemId, ItemState};

/// A frame-budgeted cooperative scheduler.
///
/// Cloning is cheap and yields another reference to the same balancer.
/// `schedule`, `stop` and `tick` may be called from any thread; ticks are
/// serialized against each other and every queue mutation happens under one
/// state lock. Callbacks run with no lock held, so they may schedule or stop
/// items on their own balancer, but must not call `tick` on it.
#[derive(Clone)]
pub struct Balancer {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) config: BalancerConfig,
    /// Held for the whole of a tick.
    pub(crate) tick_guard: Mutex<()>,
    pub(crate) state: Mutex<BalancerState>,
    pub(crate) metrics: RwLock<BalancerMetrics>,
}

pub(crate) struct BalancerState {
    /// Every live item: queued, or executing outside the lock.
    pub(crate) items: HashMap<ItemId, WorkItem>,
    pub(crate) queue: AdmissionQueue,
    pub(crate) budget: BudgetController,
    /// `now` of the most recent tick.
    pub(crate) now: f64,
    pub(crate) next_id: u64,
    pub(crate) ticks: u64,
}

impl Drop for BalancerState {
    fn drop(&mut self) {
        for item in self.items.values() {
            item.set_state(ItemState::Cancelled);
        }
    }
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BalancerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(balancer = %self.name, "Recovering poisoned balancer state lock");
            poisoned.into_inner()
        })
    }

    pub(crate) fn with_metrics(&self, f: impl FnOnce(&mut BalancerMetrics)) {
        let mut m = self.metrics.write().unwrap_or_else(|poisoned| {
            warn!(balancer = %self.name, "Recovering poisoned balancer metrics lock");
            poisoned.into_inner()
        });
        f(&mut m);
    }
}

impl Balancer {
    /// Create a balancer with the given name and config.
    pub fn new(name: impl Into<String>, config: BalancerConfig) -> Result<Self, BalancerError> {
        config.validate()?;
        let name = name.into();
        info!(
            balancer = %name,
            base_budget = config.base_budget,
            window_seconds = config.window_seconds,
            queue_capacity = config.queue_capacity,
            growth_increment = config.growth_increment,
            "Balancer created"
        );

        let state = BalancerState {
            items: HashMap::new(),
            queue: AdmissionQueue::new(config.queue_capacity),
            budget: BudgetController::from_config(&config),
            now: 0.0,
            next_id: 1,
            ticks: 0,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                metrics: RwLock::new(BalancerMetrics::new(config.base_budget)),
                name,
                config,
                tick_guard: Mutex::new(()),
                state: Mutex::new(state),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.shared.config
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.shared.lock_state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items waiting in the admission queue.
    pub fn queued(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    pub fn current_budget(&self) -> usize {
        self.shared.lock_state().budget.current()
    }

    /// `now` of the most recent tick (0.0 before the first).
    pub fn now(&self) -> f64 {
        self.shared.lock_state().now
    }

    /// Ticks driven so far.
    pub fn ticks(&self) -> u64 {
        self.shared.lock_state().ticks
    }

    /// State of a live item, `None` once it left the balancer.
    pub fn state_of(&self, id: ItemId) -> Option<ItemState> {
        self.shared.lock_state().items.get(&id).map(|item| item.state())
    }

    /// Get a snapshot of the current metrics.
    pub fn metrics(&self) -> BalancerMetrics {
        let m = self.shared.metrics.read().unwrap_or_else(|poisoned| {
            warn!(balancer = %self.shared.name, "Recovering poisoned balancer metrics lock");
            poisoned.into_inner()
        });
        m.clone()
    }

    /// Whether two values refer to the same balancer.
    pub fn ptr_eq(&self, other: &Balancer) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer")
            .field("name", &self.shared.name)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
