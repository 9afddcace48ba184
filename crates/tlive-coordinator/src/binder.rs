use tlive_core::{ConnectionState, SubscriptionKey, ThreadSelection};
use tracing::{debug, info};

use crate::{ReconnectHandle, ReconnectOptions, ThreadLiveCoordinator};

impl ThreadLiveCoordinator {
    /// Feeds the latest selection in. Only a change of mode, workspace id,
    /// thread id or workspace connectivity moves the subscription.
    pub fn set_selection(&self, selection: ThreadSelection) -> Option<ReconnectHandle> {
        let desired = {
            let mut state = self.inner.lock();
            if state.disposed {
                return None;
            }
            let signature = selection.signature();
            state.selection = selection;
            if state.last_signature.as_ref() == Some(&signature) {
                return None;
            }
            state.last_signature = Some(signature);
            state.sequence.advance();

            let desired = state.selection.subscription_key();
            state.desired = desired.clone();

            if let Some(previous) = state.active.clone() {
                if desired.as_ref() != Some(&previous) {
                    state.active = None;
                    debug!(event = "selection_left_key", key = %previous);
                    self.inner.spawn_unsubscribe(previous, "selection_changed");
                }
            }

            let Some(desired) = desired else {
                self.inner.reconcile(&state, "nothing_selected");
                return None;
            };
            if !self.inner.ui.is_visible() {
                self.inner.reconcile(&state, "hidden");
                return None;
            }

            let satisfied = state.active.as_ref() == Some(&desired)
                && *self.inner.connection.borrow() != ConnectionState::Disconnected
                && state.selection.session_connected();
            if satisfied {
                return None;
            }
            desired
        };
        Some(self.reassert(desired))
    }

    pub fn handle_focus(&self) -> Option<ReconnectHandle> {
        let desired = {
            let state = self.inner.lock();
            if state.disposed {
                return None;
            }
            state.selection.subscription_key()?
        };
        debug!(event = "focus_gained", key = %desired);
        Some(self.reassert(desired))
    }

    pub fn handle_blur(&self) {
        let mut state = self.inner.lock();
        if state.disposed {
            return;
        }
        let sequence = state.sequence.advance();
        state.desired = None;
        if let Some(active) = state.active.take() {
            self.inner.spawn_unsubscribe(active, "blur");
        }
        self.inner.reconcile(&state, "blur");
        debug!(event = "focus_lost", sequence = sequence);
    }

    /// Dispatches on the current visibility signal.
    pub fn handle_visibility_change(&self) -> Option<ReconnectHandle> {
        if self.inner.ui.is_visible() {
            self.handle_focus()
        } else {
            self.handle_blur();
            None
        }
    }

    /// Releases the subscription and the event listener. Later triggers are ignored.
    pub fn dispose(&self) {
        let subscription = {
            let mut state = self.inner.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.sequence.advance();
            state.desired = None;
            if let Some(active) = state.active.take() {
                self.inner.spawn_unsubscribe(active, "dispose");
            }
            state.self_detach.clear();
            state.in_flight.clear();
            self.inner.reconcile(&state, "dispose");
            state.bus_subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        info!(event = "coordinator_disposed");
    }

    fn reassert(&self, key: SubscriptionKey) -> ReconnectHandle {
        self.begin_reconnect(key.workspace_id(), key.thread_id(), ReconnectOptions::RESUME)
    }
}
