use std::fmt;
use std::sync::{Arc, Weak};

use crate::balancer::{Balancer, Shared};
use crate::item::StatusCell;
use crate::types::{ItemId, ItemState};

/// Non-owning reference to a scheduled work item.
///
/// The balancer owns the item; a handle can only observe its state and stop
/// it. Every operation is safe after the item retired, after the balancer was
/// dropped, and on a detached handle that never referred to an item.
#[derive(Clone, Default)]
pub struct Handle {
    inner: Option<Attached>,
}

#[derive(Clone)]
struct Attached {
    id: ItemId,
    status: Arc<StatusCell>,
    balancer: Weak<Shared>,
}

impl Handle {
    /// A handle that refers to nothing. `stop` is a no-op.
    pub fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn attached(id: ItemId, status: Arc<StatusCell>, balancer: Weak<Shared>) -> Self {
        Self {
            inner: Some(Attached {
                id,
                status,
                balancer,
            }),
        }
    }

    pub fn id(&self) -> Option<ItemId> {
        self.inner.as_ref().map(|a| a.id)
    }

    /// Current lifecycle state, or `None` for a detached handle.
    pub fn state(&self) -> Option<ItemState> {
        self.inner.as_ref().map(|a| a.status.get())
    }

    /// Whether the item can still run.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), Some(s) if !s.is_terminal())
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    /// Cancel the item. Idempotent.
    ///
    /// A callback already running completes; it is just not rescheduled.
    pub fn stop(&self) {
        let Some(attached) = &self.inner else {
            return;
        };
        if attached.status.get().is_terminal() {
            return;
        }
        if let Some(shared) = attached.balancer.upgrade() {
            Balancer::from_shared(shared).cancel(attached.id);
        }
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|a| std::ptr::eq(a.balancer.as_ptr(), Arc::as_ptr(shared)))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(a) => f
                .debug_struct("Handle")
                .field("id", &a.id)
                .field("state", &a.status.get())
                .finish(),
            None => f.write_str("Handle(detached)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_handle_is_inert() {
        let h = Handle::detached();
        assert!(!h.is_attached());
        assert_eq!(h.id(), None);
        assert_eq!(h.state(), None);
        assert!(!h.is_active());
        h.stop();
        h.stop();
        assert_eq!(format!("{h:?}"), "Handle(detached)");
    }

    #[test]
    fn handle_outliving_balancer_is_safe() {
        let status = Arc::new(StatusCell::new(ItemState::Scheduled));
        let h = Handle::attached(ItemId(9), Arc::clone(&status), Weak::new());
        assert!(h.is_active());
        h.stop();
        assert_eq!(h.state(), Some(ItemState::Scheduled));
        assert_eq!(h.id(), Some(ItemId(9)));
    }

    #[test]
    fn terminal_handle_reports_inactive() {
        let status = Arc::new(StatusCell::new(ItemState::Retired));
        let h = Handle::attached(ItemId(1), status, Weak::new());
        assert!(!h.is_active());
        h.stop();
        assert_eq!(h.state(), Some(ItemState::Retired));
    }
}
