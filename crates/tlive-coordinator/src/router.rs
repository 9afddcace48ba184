use tlive_core::{ConnectionState, LiveEvent, LiveMethod, SubscriptionKey};
use tokio::time::Instant;
use tracing::debug;

use crate::{ReconnectHandle, ReconnectOptions, ThreadLiveCoordinator};

enum Routed {
    Ignore,
    Reconnect(SubscriptionKey, ReconnectOptions),
}

impl ThreadLiveCoordinator {
    /// Applies one backend notification. Returns the reconnect it triggered,
    /// if any; events for other workspaces or threads are ignored.
    pub fn handle_event(&self, event: &LiveEvent) -> Option<ReconnectHandle> {
        let method = event.kind()?;
        match self.route(event, method) {
            Routed::Ignore => None,
            Routed::Reconnect(key, options) => Some(self.begin_reconnect(
                key.workspace_id(),
                key.thread_id(),
                options,
            )),
        }
    }

    fn route(&self, event: &LiveEvent, method: LiveMethod) -> Routed {
        let mut state = self.inner.lock();
        if state.disposed {
            return Routed::Ignore;
        }
        if state.selection.workspace_id() != Some(event.workspace_id.trim()) {
            return Routed::Ignore;
        }

        if !method.is_thread_scoped() {
            let Some(key) = state.selection.subscription_key() else {
                return Routed::Ignore;
            };
            if !self.inner.ui.is_visible() {
                return Routed::Ignore;
            }
            debug!(event = "session_reconnected", key = %key);
            return Routed::Reconnect(key, ReconnectOptions::REATTACH);
        }

        let Some(thread_id) = event.thread_id() else {
            return Routed::Ignore;
        };
        if state.selection.selected_thread_id() != Some(thread_id) {
            return Routed::Ignore;
        }
        let Ok(key) = SubscriptionKey::new(&event.workspace_id, thread_id) else {
            return Routed::Ignore;
        };

        match method {
            LiveMethod::Attached => {
                debug!(event = "thread_attached", key = %key);
                state.active = Some(key);
                self.inner
                    .set_connection_state(ConnectionState::Polling, "attached");
                Routed::Ignore
            }
            LiveMethod::Detached => {
                if state.self_detach.consume(&key, Instant::now()) {
                    debug!(event = "detach_suppressed", key = %key);
                    return Routed::Ignore;
                }
                debug!(event = "thread_detached", key = %key);
                state.active = None;
                self.inner.reconcile(&state, "detached");
                if self.inner.ui.is_visible() && self.inner.ui.is_focused() {
                    Routed::Reconnect(key, ReconnectOptions::RESUME)
                } else {
                    Routed::Ignore
                }
            }
            LiveMethod::Heartbeat => {
                self.inner
                    .set_connection_state(ConnectionState::Live, "heartbeat");
                Routed::Ignore
            }
            _ if method.is_activity() => {
                self.inner
                    .set_connection_state(ConnectionState::Live, "activity");
                Routed::Ignore
            }
            _ => Routed::Ignore,
        }
    }
}
