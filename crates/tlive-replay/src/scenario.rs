use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tlive_core::feed::decode_feed;
use tlive_core::{BackendMode, ConnectionState, WorkspaceEntry};

/// Backend procedure a scenario can count or make fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Subscribe,
    Unsubscribe,
    Refresh,
    ReconnectSession,
}

impl CallKind {
    pub const ALL: [CallKind; 4] = [
        CallKind::Subscribe,
        CallKind::Unsubscribe,
        CallKind::Refresh,
        CallKind::ReconnectSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Subscribe => "subscribe",
            CallKind::Unsubscribe => "unsubscribe",
            CallKind::Refresh => "refresh",
            CallKind::ReconnectSession => "reconnect_session",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which error an injected failure surfaces as.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[default]
    Request,
    NotConnected,
    Timeout,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReplayStep {
    Select {
        #[serde(default)]
        mode: BackendMode,
        #[serde(default)]
        workspace: Option<WorkspaceEntry>,
        #[serde(default)]
        thread_id: Option<String>,
    },
    Focus,
    Blur,
    Show,
    Hide,
    Event {
        #[serde(alias = "workspaceId")]
        workspace_id: String,
        method: String,
        #[serde(default)]
        params: Value,
    },
    Reconnect {
        #[serde(default = "default_run_resume")]
        run_resume: bool,
    },
    Wait {
        ms: u64,
    },
    FailNext {
        call: CallKind,
        #[serde(default)]
        error: FailureKind,
    },
    ExpectState {
        state: ConnectionState,
    },
    ExpectCalls {
        call: CallKind,
        count: usize,
    },
    Dispose,
}

fn default_run_resume() -> bool {
    true
}

impl ReplayStep {
    pub fn name(&self) -> &'static str {
        match self {
            ReplayStep::Select { .. } => "select",
            ReplayStep::Focus => "focus",
            ReplayStep::Blur => "blur",
            ReplayStep::Show => "show",
            ReplayStep::Hide => "hide",
            ReplayStep::Event { .. } => "event",
            ReplayStep::Reconnect { .. } => "reconnect",
            ReplayStep::Wait { .. } => "wait",
            ReplayStep::FailNext { .. } => "fail_next",
            ReplayStep::ExpectState { .. } => "expect_state",
            ReplayStep::ExpectCalls { .. } => "expect_calls",
            ReplayStep::Dispose => "dispose",
        }
    }
}

pub fn parse_scenario(input: &[u8]) -> Result<Vec<ReplayStep>> {
    let report = decode_feed::<ReplayStep>(input);
    if !report.is_clean() {
        let details = report
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        bail!("invalid scenario: {details}");
    }
    Ok(report.items)
}

pub fn load_scenario(path: &Path) -> Result<Vec<ReplayStep>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    parse_scenario(&raw).with_context(|| format!("failed to parse scenario {}", path.display()))
}
