//! Balancer error types.

use std::any::Any;

use thiserror::Error;

use crate::types::ItemId;

#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("balancer '{balancer}' is at capacity ({capacity} items)")]
    CapacityExceeded { balancer: String, capacity: usize },

    #[error("invalid interval {0}: must be finite and >= 0")]
    InvalidInterval(f64),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("balancer '{0}' is already registered")]
    DuplicateBalancer(String),
}

impl BalancerError {
    /// Whether the caller can recover by retrying later or running the work inline.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// A scheduled callback panicked. Logged and counted, never returned from `tick`.
#[derive(Debug, Error)]
#[error("work item {item} ('{name}') panicked: {message}")]
pub struct CallbackFault {
    pub item: ItemId,
    pub name: String,
    pub message: String,
}

impl CallbackFault {
    pub(crate) fn from_panic(item: ItemId, name: &str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            item,
            name: name.to_string(),
            message,
        }
    }
}
