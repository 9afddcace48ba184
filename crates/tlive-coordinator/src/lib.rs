//! Keeps one live thread subscription in step with what the user is looking
//! at, falling back to polling when the live channel drops.
//!
//! All trigger methods spawn onto the ambient Tokio runtime and must be called
//! from inside one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tlive_core::{ConnectionState, LiveEvent, SubscriptionKey, ThreadSelection};
use tokio::sync::watch;
use tracing::debug;

pub mod backend;
mod binder;
pub mod config;
mod engine;
pub mod event_bus;
mod router;
pub mod sequence;
pub mod suppressor;

pub use backend::{SharedUiSignals, ThreadLiveBackend, UiSignals};
pub use config::CoordinatorConfig;
pub use event_bus::{EventBus, EventSubscription, LiveEventHandler, LocalEventBus};
pub use sequence::SequenceGuard;
pub use suppressor::SelfDetachWindow;

/// Resolves to true when the attempt ended with its key actively subscribed.
pub type ReconnectHandle = Shared<BoxFuture<'static, bool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Refresh the thread before subscribing.
    pub run_resume: bool,
}

impl ReconnectOptions {
    pub const RESUME: Self = Self { run_resume: true };
    pub const REATTACH: Self = Self { run_resume: false };
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self::RESUME
    }
}

struct InFlightAttempt {
    sequence: u64,
    handle: ReconnectHandle,
}

struct CoordinatorState {
    selection: ThreadSelection,
    last_signature: Option<tlive_core::SelectionSignature>,
    desired: Option<SubscriptionKey>,
    active: Option<SubscriptionKey>,
    sequence: SequenceGuard,
    self_detach: SelfDetachWindow,
    in_flight: HashMap<SubscriptionKey, InFlightAttempt>,
    bus_subscription: Option<EventSubscription>,
    disposed: bool,
}

struct Inner {
    backend: Arc<dyn ThreadLiveBackend>,
    ui: Arc<dyn UiSignals>,
    state: Mutex<CoordinatorState>,
    connection: watch::Sender<ConnectionState>,
}

#[derive(Clone)]
pub struct ThreadLiveCoordinator {
    inner: Arc<Inner>,
}

impl ThreadLiveCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        backend: Arc<dyn ThreadLiveBackend>,
        ui: Arc<dyn UiSignals>,
    ) -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let state = CoordinatorState {
            selection: ThreadSelection::default(),
            last_signature: None,
            desired: None,
            active: None,
            sequence: SequenceGuard::default(),
            self_detach: SelfDetachWindow::new(config.self_detach_window),
            in_flight: HashMap::new(),
            bus_subscription: None,
            disposed: false,
        };
        Self {
            inner: Arc::new(Inner {
                backend,
                ui,
                state: Mutex::new(state),
                connection,
            }),
        }
    }

    /// Registers the single event handler for this coordinator, replacing any
    /// earlier registration.
    pub fn attach(&self, bus: &dyn EventBus) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handler: LiveEventHandler = Arc::new(move |event: &LiveEvent| {
            if let Some(inner) = weak.upgrade() {
                ThreadLiveCoordinator { inner }.handle_event(event);
            }
        });
        let subscription = bus.subscribe(handler);
        let previous = {
            let mut state = self.inner.lock();
            if state.disposed {
                Some(subscription)
            } else {
                state.bus_subscription.replace(subscription)
            }
        };
        drop(previous);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    pub fn active_key(&self) -> Option<SubscriptionKey> {
        self.inner.lock().active.clone()
    }

    pub fn desired_key(&self) -> Option<SubscriptionKey> {
        self.inner.lock().desired.clone()
    }

    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence.current()
    }

    pub fn selection(&self) -> ThreadSelection {
        self.inner.lock().selection.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_connection_state(&self, next: ConnectionState, reason: &'static str) {
        let mut previous = next;
        let changed = self.connection.send_if_modified(|current| {
            previous = *current;
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            debug!(
                event = "connection_state",
                from = %previous,
                to = %next,
                reason = reason
            );
        }
    }

    fn reconcile(&self, state: &CoordinatorState, reason: &'static str) {
        self.set_connection_state(state.selection.resting_state(), reason);
    }

    /// Fire-and-forget unsubscribe; failures only reach the debug log.
    fn spawn_unsubscribe(&self, key: SubscriptionKey, reason: &'static str) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            unsubscribe_best_effort(backend.as_ref(), &key, reason).await;
        });
    }
}

async fn unsubscribe_best_effort(
    backend: &dyn ThreadLiveBackend,
    key: &SubscriptionKey,
    reason: &'static str,
) {
    if let Err(err) = backend.unsubscribe(key).await {
        debug!(
            event = "unsubscribe_failed",
            key = %key,
            reason = reason,
            error = %err
        );
    }
}

fn resolved(value: bool) -> ReconnectHandle {
    futures_util::future::ready(value).boxed().shared()
}
