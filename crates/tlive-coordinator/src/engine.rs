use std::sync::Arc;

use futures_util::future::FutureExt;
use tlive_core::{BackendError, ConnectionState, SubscriptionKey, WorkspaceEntry};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    resolved, unsubscribe_best_effort, InFlightAttempt, Inner, ReconnectHandle, ReconnectOptions,
    ThreadLiveCoordinator,
};

impl ThreadLiveCoordinator {
    /// Makes the active subscription equal to `(workspace_id, thread_id)`.
    ///
    /// Resolves to false when the request is rejected, fails, or is superseded
    /// by a later trigger before it completes.
    pub async fn reconnect(
        &self,
        workspace_id: &str,
        thread_id: &str,
        options: ReconnectOptions,
    ) -> bool {
        self.begin_reconnect(workspace_id, thread_id, options).await
    }

    /// Synchronous half of [`reconnect`](Self::reconnect): updates the desired
    /// key and sequence immediately, then hands back a shared handle to the
    /// attempt, which keeps running whether or not the handle is awaited.
    pub fn begin_reconnect(
        &self,
        workspace_id: &str,
        thread_id: &str,
        options: ReconnectOptions,
    ) -> ReconnectHandle {
        let mut state = self.inner.lock();
        if state.disposed {
            return resolved(false);
        }

        let workspace = state
            .selection
            .workspace
            .clone()
            .filter(|workspace| workspace.id.trim() == workspace_id.trim());
        let key = SubscriptionKey::new(workspace_id, thread_id);
        let (key, workspace) = match (state.selection.mode.is_remote(), key, workspace) {
            (true, Ok(key), Some(workspace)) => (key, workspace),
            (remote, key, workspace) => {
                debug!(
                    event = "reconnect_rejected",
                    workspace_id = workspace_id,
                    thread_id = thread_id,
                    remote = remote,
                    valid_key = key.is_ok(),
                    has_workspace = workspace.is_some()
                );
                self.inner.reconcile(&state, "reconnect_rejected");
                return resolved(false);
            }
        };

        state.desired = Some(key.clone());

        let current = state.sequence.current();
        if let Some(existing) = state.in_flight.get(&key) {
            if existing.sequence == current {
                debug!(event = "reconnect_coalesced", key = %key, sequence = current);
                return existing.handle.clone();
            }
        }
        state.in_flight.remove(&key);

        let sequence = state.sequence.advance();
        let starting = if workspace.connected {
            ConnectionState::Polling
        } else {
            ConnectionState::Disconnected
        };
        self.inner.set_connection_state(starting, "reconnect_started");
        debug!(
            event = "reconnect_started",
            key = %key,
            sequence = sequence,
            run_resume = options.run_resume,
            session_connected = workspace.connected
        );

        // Spawned under the lock so the attempt cannot finish before it is registered.
        let inner = Arc::clone(&self.inner);
        let attempt_key = key.clone();
        let task = tokio::spawn(async move {
            inner
                .run_attempt(attempt_key, workspace, sequence, options)
                .await
        });
        let handle: ReconnectHandle = async move { task.await.unwrap_or(false) }
            .boxed()
            .shared();
        state.in_flight.insert(
            key,
            InFlightAttempt {
                sequence,
                handle: handle.clone(),
            },
        );
        handle
    }
}

enum AfterSubscribe {
    Active,
    Superseded { abandoned: bool },
}

impl Inner {
    fn is_current(&self, sequence: u64) -> bool {
        self.lock().sequence.is_current(sequence)
    }

    async fn run_attempt(
        self: Arc<Self>,
        key: SubscriptionKey,
        workspace: WorkspaceEntry,
        sequence: u64,
        options: ReconnectOptions,
    ) -> bool {
        let subscribed = match self.drive_attempt(&key, &workspace, sequence, options).await {
            Ok(subscribed) => subscribed,
            Err(err) => {
                warn!(
                    event = "reconnect_failed",
                    key = %key,
                    sequence = sequence,
                    error = %err
                );
                let state = self.lock();
                if state.sequence.is_current(sequence) {
                    self.reconcile(&state, "reconnect_failed");
                }
                false
            }
        };
        self.finish_attempt(&key, sequence);
        subscribed
    }

    async fn drive_attempt(
        &self,
        key: &SubscriptionKey,
        workspace: &WorkspaceEntry,
        sequence: u64,
        options: ReconnectOptions,
    ) -> Result<bool, BackendError> {
        if !workspace.connected {
            self.backend.reconnect_session(workspace).await?;
            if !self.is_current(sequence) {
                debug!(event = "reconnect_superseded", key = %key, stage = "session");
                return Ok(false);
            }
        }

        if options.run_resume {
            self.backend.refresh_thread(key).await?;
            if !self.is_current(sequence) {
                debug!(event = "reconnect_superseded", key = %key, stage = "refresh");
                return Ok(false);
            }
        }

        let resubscribing = {
            let mut state = self.lock();
            if state.active.as_ref() == Some(key) {
                state.self_detach.record(key.clone(), Instant::now());
                state.active = None;
                true
            } else {
                false
            }
        };
        if resubscribing {
            debug!(event = "resubscribe_same_key", key = %key, sequence = sequence);
            unsubscribe_best_effort(self.backend.as_ref(), key, "resubscribe").await;
            if !self.is_current(sequence) {
                debug!(event = "reconnect_superseded", key = %key, stage = "resubscribe");
                return Ok(false);
            }
        }

        self.backend.subscribe(key).await?;

        let after = {
            let mut state = self.lock();
            if state.sequence.is_current(sequence) {
                state.active = Some(key.clone());
                self.set_connection_state(ConnectionState::Polling, "subscribed");
                AfterSubscribe::Active
            } else {
                AfterSubscribe::Superseded {
                    abandoned: state.desired.as_ref() != Some(key),
                }
            }
        };

        match after {
            AfterSubscribe::Active => {
                info!(event = "subscription_active", key = %key, sequence = sequence);
                Ok(true)
            }
            AfterSubscribe::Superseded { abandoned } => {
                debug!(
                    event = "reconnect_superseded",
                    key = %key,
                    stage = "subscribe",
                    abandoned = abandoned
                );
                if abandoned {
                    unsubscribe_best_effort(self.backend.as_ref(), key, "superseded").await;
                }
                Ok(false)
            }
        }
    }

    fn finish_attempt(&self, key: &SubscriptionKey, sequence: u64) {
        let mut state = self.lock();
        let finished = state
            .in_flight
            .get(key)
            .is_some_and(|attempt| attempt.sequence == sequence);
        if finished {
            state.in_flight.remove(key);
        }
    }
}
