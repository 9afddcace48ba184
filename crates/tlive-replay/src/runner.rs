use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tlive_core::{ConnectionState, LiveEvent, ThreadSelection};
use tlive_coordinator::{
    CoordinatorConfig, LocalEventBus, ReconnectHandle, ReconnectOptions, SharedUiSignals,
    ThreadLiveCoordinator,
};
use tracing::{debug, info};

use crate::recording::RecordingBackend;
use crate::scenario::{CallKind, ReplayStep};

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    pub config: CoordinatorConfig,
    pub latency: Duration,
    pub echo: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            latency: Duration::ZERO,
            echo: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExpectationFailure {
    pub step: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: usize,
    pub calls: BTreeMap<CallKind, usize>,
    pub transitions: Vec<ConnectionState>,
    pub final_state: ConnectionState,
    pub failures: Vec<ExpectationFailure>,
}

impl ReplayReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "steps: {}", self.steps)?;
        let calls = self
            .calls
            .iter()
            .map(|(kind, count)| format!("{kind}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(f, "calls: {calls}")?;
        let states = self
            .transitions
            .iter()
            .map(ConnectionState::as_str)
            .collect::<Vec<_>>()
            .join(" -> ");
        writeln!(f, "states: {states}")?;
        writeln!(f, "final state: {}", self.final_state)?;
        if self.passed() {
            return write!(f, "result: ok");
        }
        write!(f, "result: {} expectation(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  step {}: {}", failure.step, failure.message)?;
        }
        Ok(())
    }
}

/// Drives a fresh coordinator through `steps` against a recording backend.
/// The UI starts visible and focused.
pub async fn run_scenario(steps: &[ReplayStep], options: ReplayOptions) -> ReplayReport {
    let bus = LocalEventBus::new();
    let backend = Arc::new(RecordingBackend::new(
        options.latency,
        options.echo.then(|| bus.clone()),
    ));
    let ui = Arc::new(SharedUiSignals::new(true, true));
    let coordinator = ThreadLiveCoordinator::new(options.config, backend.clone(), ui.clone());
    coordinator.attach(&bus);

    let transitions = Arc::new(Mutex::new(vec![coordinator.connection_state()]));
    let mut states = coordinator.watch_connection_state();
    let recorder = {
        let transitions = Arc::clone(&transitions);
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let next = *states.borrow_and_update();
                let mut seen = transitions.lock().unwrap_or_else(PoisonError::into_inner);
                if seen.last() != Some(&next) {
                    seen.push(next);
                }
            }
        })
    };

    let mut failures = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let number = index + 1;
        debug!(event = "replay_step", step = number, kind = step.name());
        let pending: Option<ReconnectHandle> = match step {
            ReplayStep::Select {
                mode,
                workspace,
                thread_id,
            } => coordinator.set_selection(ThreadSelection::new(
                *mode,
                workspace.clone(),
                thread_id.as_deref(),
            )),
            ReplayStep::Focus => {
                ui.set_focused(true);
                coordinator.handle_focus()
            }
            ReplayStep::Blur => {
                ui.set_focused(false);
                coordinator.handle_blur();
                None
            }
            ReplayStep::Show => {
                ui.set_visible(true);
                coordinator.handle_visibility_change()
            }
            ReplayStep::Hide => {
                ui.set_visible(false);
                coordinator.handle_visibility_change()
            }
            ReplayStep::Event {
                workspace_id,
                method,
                params,
            } => coordinator.handle_event(&LiveEvent::new(
                workspace_id.as_str(),
                method.as_str(),
                params.clone(),
            )),
            ReplayStep::Reconnect { run_resume } => {
                let selection = coordinator.selection();
                Some(coordinator.begin_reconnect(
                    selection.workspace_id().unwrap_or_default(),
                    selection.selected_thread_id().unwrap_or_default(),
                    ReconnectOptions {
                        run_resume: *run_resume,
                    },
                ))
            }
            ReplayStep::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                None
            }
            ReplayStep::FailNext { call, error } => {
                backend.fail_next(*call, *error);
                None
            }
            ReplayStep::ExpectState { state } => {
                let actual = coordinator.connection_state();
                if actual != *state {
                    failures.push(ExpectationFailure {
                        step: number,
                        message: format!("expected state {state}, got {actual}"),
                    });
                }
                None
            }
            ReplayStep::ExpectCalls { call, count } => {
                let actual = backend.count(*call);
                if actual != *count {
                    failures.push(ExpectationFailure {
                        step: number,
                        message: format!("expected {count} {call} call(s), got {actual}"),
                    });
                }
                None
            }
            ReplayStep::Dispose => {
                coordinator.dispose();
                None
            }
        };
        if let Some(handle) = pending {
            let subscribed = handle.await;
            debug!(event = "replay_reconnect_resolved", step = number, subscribed = subscribed);
        }
        settle().await;
    }

    let final_state = coordinator.connection_state();
    recorder.abort();
    let transitions = transitions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let report = ReplayReport {
        steps: steps.len(),
        calls: backend.counts(),
        transitions,
        final_state,
        failures,
    };
    info!(
        event = "replay_finished",
        steps = report.steps,
        failures = report.failures.len(),
        final_state = %report.final_state
    );
    report
}

/// Serializes the report for `--json`.
pub fn report_json(report: &ReplayReport) -> serde_json::Result<Value> {
    serde_json::to_value(report)
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::parse_scenario;

    const SELECT: &str = r#"{"step":"select","mode":"remote","workspace":{"id":"ws-1","name":"Main","connected":true},"thread_id":"thread-1"}"#;

    async fn replay(lines: &[&str], options: ReplayOptions) -> ReplayReport {
        let feed = lines.join("\n");
        let steps = parse_scenario(feed.as_bytes()).expect("scenario");
        run_scenario(&steps, options).await
    }

    #[tokio::test]
    async fn mount_scenario_subscribes_once_and_goes_live() {
        let report = replay(
            &[
                SELECT,
                r#"{"step":"expect_calls","call":"subscribe","count":1}"#,
                r#"{"step":"expect_calls","call":"refresh","count":1}"#,
                r#"{"step":"expect_state","state":"polling"}"#,
                r#"{"step":"event","workspace_id":"ws-1","method":"thread/live_heartbeat","params":{"threadId":"thread-1"}}"#,
                r#"{"step":"expect_state","state":"live"}"#,
            ],
            ReplayOptions::default(),
        )
        .await;

        assert!(report.passed(), "{report}");
        assert_eq!(report.final_state, ConnectionState::Live);
        assert_eq!(report.transitions.first(), Some(&ConnectionState::Disconnected));
        assert_eq!(report.transitions.last(), Some(&ConnectionState::Live));
    }

    #[tokio::test]
    async fn echoed_detach_from_own_resubscribe_is_ignored() {
        let report = replay(
            &[
                SELECT,
                r#"{"step":"reconnect","run_resume":false}"#,
                r#"{"step":"expect_calls","call":"subscribe","count":2}"#,
                r#"{"step":"expect_calls","call":"unsubscribe","count":1}"#,
                r#"{"step":"expect_calls","call":"refresh","count":1}"#,
            ],
            ReplayOptions::default(),
        )
        .await;
        assert!(report.passed(), "{report}");
    }

    const DETACHED: &str = r#"{"step":"event","workspace_id":"ws-1","method":"thread/live_detached","params":{"threadId":"thread-1"}}"#;

    #[tokio::test]
    async fn manual_detach_inside_window_is_suppressed() {
        let report = replay(
            &[
                SELECT,
                r#"{"step":"reconnect","run_resume":false}"#,
                DETACHED,
                r#"{"step":"expect_calls","call":"subscribe","count":2}"#,
            ],
            ReplayOptions {
                echo: false,
                ..ReplayOptions::default()
            },
        )
        .await;
        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    async fn manual_detach_after_window_reconnects() {
        let options = ReplayOptions {
            config: CoordinatorConfig::default().with_self_detach_window(Duration::from_millis(5)),
            latency: Duration::ZERO,
            echo: false,
        };
        let report = replay(
            &[
                SELECT,
                r#"{"step":"reconnect","run_resume":false}"#,
                r#"{"step":"wait","ms":20}"#,
                DETACHED,
                r#"{"step":"expect_calls","call":"subscribe","count":3}"#,
                r#"{"step":"expect_calls","call":"refresh","count":2}"#,
            ],
            options,
        )
        .await;
        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    async fn failures_are_reported_per_step() {
        let report = replay(
            &[
                r#"{"step":"fail_next","call":"subscribe"}"#,
                SELECT,
                r#"{"step":"expect_state","state":"live"}"#,
                r#"{"step":"expect_calls","call":"subscribe","count":3}"#,
            ],
            ReplayOptions::default(),
        )
        .await;

        assert!(!report.passed());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].step, 3);
        assert_eq!(report.failures[0].message, "expected state live, got polling");
        assert_eq!(report.failures[1].step, 4);
        assert!(report.to_string().contains("2 expectation(s) failed"));
    }

    #[tokio::test]
    async fn blur_and_dispose_release_the_subscription() {
        let report = replay(
            &[
                SELECT,
                r#"{"step":"blur"}"#,
                r#"{"step":"expect_calls","call":"unsubscribe","count":1}"#,
                r#"{"step":"focus"}"#,
                r#"{"step":"expect_calls","call":"subscribe","count":2}"#,
                r#"{"step":"dispose"}"#,
                r#"{"step":"expect_calls","call":"unsubscribe","count":2}"#,
                r#"{"step":"reconnect"}"#,
                r#"{"step":"expect_calls","call":"subscribe","count":2}"#,
            ],
            ReplayOptions::default(),
        )
        .await;
        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    async fn disconnected_workspace_reconnects_session_first() {
        let report = replay(
            &[
                r#"{"step":"hide"}"#,
                r#"{"step":"select","mode":"remote","workspace":{"id":"ws-1","connected":false},"thread_id":"thread-1"}"#,
                r#"{"step":"expect_state","state":"disconnected"}"#,
                r#"{"step":"expect_calls","call":"reconnect_session","count":0}"#,
                r#"{"step":"show"}"#,
                r#"{"step":"expect_calls","call":"reconnect_session","count":1}"#,
                r#"{"step":"expect_calls","call":"subscribe","count":1}"#,
            ],
            ReplayOptions {
                echo: false,
                ..ReplayOptions::default()
            },
        )
        .await;
        assert!(report.passed(), "{report}");
        let json = report_json(&report).expect("json");
        assert_eq!(json["calls"]["reconnect_session"], 1);
        assert_eq!(json["final_state"], "polling");
    }
}
