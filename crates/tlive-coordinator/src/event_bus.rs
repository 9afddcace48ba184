use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tlive_core::LiveEvent;

pub type LiveEventHandler = Arc<dyn Fn(&LiveEvent) + Send + Sync>;

/// Fan-out source of backend notifications.
pub trait EventBus: Send + Sync {
    fn subscribe(&self, handler: LiveEventHandler) -> EventSubscription;
}

/// Registration handle. The handler is removed on `unsubscribe` or drop.
pub struct EventSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl EventSubscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

type HandlerMap = BTreeMap<u64, LiveEventHandler>;

/// In-process bus. Handlers run synchronously on the publishing task, in
/// registration order, against a snapshot taken at publish time.
#[derive(Clone, Default)]
pub struct LocalEventBus {
    next_id: Arc<AtomicU64>,
    handlers: Arc<RwLock<HandlerMap>>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: &LiveEvent) -> usize {
        let snapshot: Vec<LiveEventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&self, handler: LiveEventHandler) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handler);
        let handlers = Arc::clone(&self.handlers);
        EventSubscription::new(move || {
            handlers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        })
    }
}
