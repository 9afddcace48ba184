#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tlive_core::{BackendError, SubscriptionKey, ThreadSelection, WorkspaceEntry};
use tlive_coordinator::{
    CoordinatorConfig, LocalEventBus, SharedUiSignals, ThreadLiveBackend, ThreadLiveCoordinator,
};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe(String),
    Unsubscribe(String),
    Refresh(String),
    ReconnectSession(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Subscribe,
    Unsubscribe,
    Refresh,
    ReconnectSession,
}

/// Records every call. One operation can be held at a gate until the test
/// releases permits.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<Op>>,
    gate: Option<(Op, Arc<Semaphore>)>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds subscribes in flight.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        Self::gated_on(Op::Subscribe)
    }

    pub fn gated_on(op: Op) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let backend = Self {
            gate: Some((op, Arc::clone(&gate))),
            ..Self::default()
        };
        (Arc::new(backend), gate)
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().expect("failing").insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().expect("failing").remove(&op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    (op, call),
                    (Op::Subscribe, Call::Subscribe(_))
                        | (Op::Unsubscribe, Call::Unsubscribe(_))
                        | (Op::Refresh, Call::Refresh(_))
                        | (Op::ReconnectSession, Call::ReconnectSession(_))
                )
            })
            .count()
    }

    async fn record(&self, call: Call, op: Op) -> Result<(), BackendError> {
        self.calls.lock().expect("calls").push(call);
        if let Some((gated, gate)) = &self.gate {
            if *gated == op {
                gate.acquire()
                    .await
                    .map_err(|err| BackendError::request(err.to_string()))?
                    .forget();
            }
        }
        if self.failing.lock().expect("failing").contains(&op) {
            return Err(BackendError::request(format!("{op:?} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl ThreadLiveBackend for FakeBackend {
    async fn subscribe(&self, key: &SubscriptionKey) -> Result<(), BackendError> {
        self.record(Call::Subscribe(key.to_string()), Op::Subscribe)
            .await
    }

    async fn unsubscribe(&self, key: &SubscriptionKey) -> Result<(), BackendError> {
        self.record(Call::Unsubscribe(key.to_string()), Op::Unsubscribe)
            .await
    }

    async fn refresh_thread(&self, key: &SubscriptionKey) -> Result<(), BackendError> {
        self.record(Call::Refresh(key.to_string()), Op::Refresh).await
    }

    async fn reconnect_session(&self, workspace: &WorkspaceEntry) -> Result<(), BackendError> {
        self.record(
            Call::ReconnectSession(workspace.id.clone()),
            Op::ReconnectSession,
        )
        .await
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub ui: Arc<SharedUiSignals>,
    pub bus: LocalEventBus,
    pub coordinator: ThreadLiveCoordinator,
}

impl Harness {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        let ui = Arc::new(SharedUiSignals::new(true, true));
        let bus = LocalEventBus::new();
        let coordinator = ThreadLiveCoordinator::new(
            CoordinatorConfig::default(),
            backend.clone(),
            ui.clone(),
        );
        coordinator.attach(&bus);
        Self {
            backend,
            ui,
            bus,
            coordinator,
        }
    }
}

pub fn workspace(connected: bool) -> WorkspaceEntry {
    WorkspaceEntry::new("ws-1", "Main", connected)
}

pub fn selection(thread_id: &str) -> ThreadSelection {
    ThreadSelection::remote(workspace(true), thread_id)
}

pub fn key(thread_id: &str) -> SubscriptionKey {
    SubscriptionKey::new("ws-1", thread_id).expect("key")
}

/// Lets spawned fire-and-forget work run to its next suspension point.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
