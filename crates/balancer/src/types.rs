use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identity of a scheduled work item, unique within one balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    /// Created, not yet admitted to the queue.
    Pending,
    /// Waiting in the admission queue for its due time.
    Scheduled,
    /// Callback is running in the current tick.
    Executing,
    /// Finished: callback asked to stop, one-shot ran, or callback panicked.
    Retired,
    /// Stopped through its handle.
    Cancelled,
}

impl ItemState {
    /// Retired and Cancelled items never run again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Retired | Self::Cancelled)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Scheduled => 1,
            Self::Executing => 2,
            Self::Retired => 3,
            Self::Cancelled => 4,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Scheduled,
            2 => Self::Executing,
            3 => Self::Retired,
            _ => Self::Cancelled,
        }
    }
}

/// What a work item wants after it ran.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Continuation {
    /// Run again after the item's configured interval.
    Continue,
    /// Run again after the given number of seconds, this time only.
    ContinueAfter(f64),
    /// Stop scheduling this item.
    Retire,
}

impl From<bool> for Continuation {
    fn from(keep_running: bool) -> Self {
        if keep_running {
            Self::Continue
        } else {
            Self::Retire
        }
    }
}

/// Options for [`crate::Balancer::schedule_work`].
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// Minimum seconds between executions. 0 = every tick the budget allows.
    pub interval: f64,
    /// One-shot items retire after their first execution.
    pub repeating: bool,
    /// Seconds until the first execution. Defaults to `interval`.
    pub initial_delay: Option<f64>,
    /// Name used in logs and per-name metrics. Defaults to the work's own name.
    pub name: Option<String>,
}

impl ScheduleOptions {
    /// Repeating item with the given interval.
    pub fn every(interval: f64) -> Self {
        Self {
            interval,
            repeating: true,
            initial_delay: None,
            name: None,
        }
    }

    /// One-shot item that runs once after `delay` seconds.
    pub fn once_after(delay: f64) -> Self {
        Self {
            interval: delay,
            repeating: false,
            initial_delay: None,
            name: None,
        }
    }

    pub fn with_initial_delay(mut self, delay: f64) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Seconds from scheduling to the first due time.
    pub fn first_delay(&self) -> f64 {
        self.initial_delay.unwrap_or(self.interval)
    }
}

/// Summary of one `tick` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// 1-based tick counter of the balancer.
    pub tick: u64,
    /// Effective time of the tick in seconds.
    pub now: f64,
    /// Items due when the tick started.
    pub due: usize,
    /// Callbacks invoked.
    pub executed: usize,
    /// Callbacks that panicked (counted in `executed` and `retired` too).
    pub faulted: usize,
    /// Items retired by this tick.
    pub retired: usize,
    /// Items stopped while their callback was running.
    pub cancelled_in_flight: usize,
    /// Due items left in the queue for a later tick.
    pub deferred: usize,
    /// Budget in effect for this tick.
    pub budget: usize,
    /// Wall-clock time spent in the tick.
    pub elapsed: Duration,
}

impl TickReport {
    /// Whether due work was left behind.
    pub fn overflowed(&self) -> bool {
        self.deferred > 0
    }
}
