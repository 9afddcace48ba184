use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tlive_core::live_events::{METHOD_LIVE_ATTACHED, METHOD_LIVE_DETACHED};
use tlive_core::{BackendError, LiveEvent, SubscriptionKey, WorkspaceEntry};
use tlive_coordinator::{LocalEventBus, ThreadLiveBackend};
use tracing::debug;

use crate::scenario::{CallKind, FailureKind};

/// Stand-in backend for replays: counts calls, fails on request and, when
/// given a bus, announces attach/detach the way a real server would.
pub struct RecordingBackend {
    counts: Mutex<BTreeMap<CallKind, usize>>,
    failures: Mutex<HashMap<CallKind, VecDeque<FailureKind>>>,
    latency: Duration,
    echo: Option<LocalEventBus>,
}

impl RecordingBackend {
    pub fn new(latency: Duration, echo: Option<LocalEventBus>) -> Self {
        let counts = CallKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        Self {
            counts: Mutex::new(counts),
            failures: Mutex::new(HashMap::new()),
            latency,
            echo,
        }
    }

    /// The next call of `kind` fails with `failure`. Calls queue up.
    pub fn fail_next(&self, kind: CallKind, failure: FailureKind) {
        lock(&self.failures)
            .entry(kind)
            .or_default()
            .push_back(failure);
    }

    pub fn count(&self, kind: CallKind) -> usize {
        lock(&self.counts).get(&kind).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> BTreeMap<CallKind, usize> {
        lock(&self.counts).clone()
    }

    async fn call(&self, kind: CallKind, target: &str) -> Result<(), BackendError> {
        *lock(&self.counts).entry(kind).or_insert(0) += 1;
        let injected = lock(&self.failures)
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match injected {
            Some(failure) => {
                debug!(event = "replay_injected_failure", call = %kind, subject = target);
                Err(injected_error(failure, kind, target))
            }
            None => Ok(()),
        }
    }

    fn announce(&self, key: &SubscriptionKey, method: &str) {
        if let Some(bus) = &self.echo {
            let event = LiveEvent::for_thread(key.workspace_id(), method, key.thread_id());
            bus.publish(&event);
        }
    }
}

#[async_trait]
impl ThreadLiveBackend for RecordingBackend {
    async fn subscribe(&self, key: &SubscriptionKey) -> Result<(), BackendError> {
        self.call(CallKind::Subscribe, &key.to_string()).await?;
        self.announce(key, METHOD_LIVE_ATTACHED);
        Ok(())
    }

    async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), BackendError> {
        self.call(CallKind::Unsubscribe, &key.to_string()).await?;
        self.announce(key, METHOD_LIVE_DETACHED);
        Ok(())
    }

    async fn refresh_thread(&self, key: &SubscriptionKey) -> Result<(), BackendError> {
        self.call(CallKind::Refresh, &key.to_string()).await
    }

    async fn reconnect_session(&self, workspace: &WorkspaceEntry) -> Result<(), BackendError> {
        self.call(CallKind::ReconnectSession, &workspace.id).await
    }
}

fn injected_error(failure: FailureKind, kind: CallKind, target: &str) -> BackendError {
    match failure {
        FailureKind::Request => BackendError::request(format!("injected {kind} failure")),
        FailureKind::NotConnected => BackendError::NotConnected(target.to_string()),
        FailureKind::Timeout => BackendError::Timeout(format!("{kind} {target}")),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
