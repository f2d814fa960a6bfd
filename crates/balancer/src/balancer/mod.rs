//! The balancer: admission, per-tick draining and cancellation.
//!
//! Split into focused submodules:
//! - `core`: Balancer struct, shared state, constructor and accessors
//! - `scheduling`: admission of work items and cancellation
//! - `execution`: the per-tick drain loop

mod core;
mod execution;
mod scheduling;

pub use self::core::Balancer;
pub(crate) use self::core::Shared;
