//! Frame-budgeted cooperative task scheduling.
//!
//! A [`Balancer`] spreads recurring low-priority work (sensor scans, obstacle
//! polling, AI ticks, retry loops) across host cycles. The host calls
//! [`Balancer::tick`] once per cycle; each tick runs at most the current
//! budget of due items and leaves the rest for later ticks. The budget grows
//! while the queue stays backlogged and decays back once it clears.

pub mod balancer;
pub mod budget;
pub mod config;
pub mod error;
pub mod handle;
mod item;
pub mod metrics;
pub mod presets;
pub mod queue;
pub mod registry;
pub mod types;
pub mod work;

pub use balancer::Balancer;
pub use budget::{BudgetChange, BudgetController};
pub use config::{BalancerConfig, RegistryConfig};
pub use error::{BalancerError, CallbackFault};
pub use handle::Handle;
pub use metrics::BalancerMetrics;
pub use queue::AdmissionQueue;
pub use registry::BalancerRegistry;
pub use types::{Continuation, ItemId, ItemState, ScheduleOptions, TickReport};
pub use work::{FnWork, StatefulWork, TickContext, Work};
