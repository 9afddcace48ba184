use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tlive_core::{BackendError, SubscriptionKey, WorkspaceEntry};

/// Remote procedures the coordinator drives. Implementations own their own
/// timeouts and retries.
#[async_trait]
pub trait ThreadLiveBackend: Send + Sync {
    async fn subscribe(&self, key: &SubscriptionKey) -> Result<(), BackendError>;

    async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), BackendError>;

    /// Re-fetch the thread so the view catches up with anything missed.
    async fn refresh_thread(&self, key: &SubscriptionKey) -> Result<(), BackendError>;

    async fn reconnect_session(&self, _workspace: &WorkspaceEntry) -> Result<(), BackendError> {
        Ok(())
    }
}

pub trait UiSignals: Send + Sync {
    fn is_visible(&self) -> bool;
    fn is_focused(&self) -> bool;
}

#[derive(Debug)]
pub struct SharedUiSignals {
    visible: AtomicBool,
    focused: AtomicBool,
}

impl Default for SharedUiSignals {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl SharedUiSignals {
    pub fn new(visible: bool, focused: bool) -> Self {
        Self {
            visible: AtomicBool::new(visible),
            focused: AtomicBool::new(focused),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }
}

impl UiSignals for SharedUiSignals {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }
}
