use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod feed;
pub mod live_events;

pub use error::{BackendError, KeyError};
pub use live_events::{LiveEvent, LiveMethod};

pub const KEY_SEPARATOR: &str = "::";

/// Identity of the thread currently being watched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    workspace_id: String,
    thread_id: String,
}

impl SubscriptionKey {
    pub fn new(workspace_id: &str, thread_id: &str) -> Result<Self, KeyError> {
        let workspace_id = workspace_id.trim();
        let thread_id = thread_id.trim();
        if workspace_id.is_empty() {
            return Err(KeyError::EmptyWorkspaceId);
        }
        if thread_id.is_empty() {
            return Err(KeyError::EmptyThreadId);
        }
        Ok(Self {
            workspace_id: workspace_id.to_string(),
            thread_id: thread_id.to_string(),
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.workspace_id, self.thread_id)
    }
}

impl FromStr for SubscriptionKey {
    type Err = KeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (workspace_id, thread_id) = input
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::Malformed(input.to_string()))?;
        Self::new(workspace_id, thread_id)
    }
}

impl Serialize for SubscriptionKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SubscriptionKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Heartbeat or thread activity confirms the backend is streaming.
    Live,
    /// Subscribed (or about to be) without liveness confirmation.
    Polling,
    Disconnected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Live => "live",
            ConnectionState::Polling => "polling",
            ConnectionState::Disconnected => "disconnected",
        }
    }

    /// Resting state absent any live confirmation.
    pub fn resting(mode: BackendMode, session_connected: bool) -> Self {
        match (mode, session_connected) {
            (_, false) => ConnectionState::Disconnected,
            (BackendMode::Remote, true) => ConnectionState::Polling,
            (BackendMode::Local, true) => ConnectionState::Live,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(ConnectionState::Live),
            "polling" => Ok(ConnectionState::Polling),
            "disconnected" => Ok(ConnectionState::Disconnected),
            other => Err(format!("Unknown connection state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Local,
    Remote,
}

impl Default for BackendMode {
    fn default() -> Self {
        Self::Local
    }
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Local => "local",
            BackendMode::Remote => "remote",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, BackendMode::Remote)
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendMode::Local),
            "remote" => Ok(BackendMode::Remote),
            other => Err(format!("Unknown backend mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub connected: bool,
}

impl WorkspaceEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, connected: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connected,
        }
    }
}

/// What the user is looking at right now, as reported by the host UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadSelection {
    #[serde(default)]
    pub mode: BackendMode,
    #[serde(default)]
    pub workspace: Option<WorkspaceEntry>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// The subset of a selection that decides whether the subscription must change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionSignature {
    pub mode: BackendMode,
    pub workspace_id: Option<String>,
    pub thread_id: Option<String>,
    pub workspace_connected: bool,
}

impl ThreadSelection {
    pub fn new(mode: BackendMode, workspace: Option<WorkspaceEntry>, thread_id: Option<&str>) -> Self {
        Self {
            mode,
            workspace,
            thread_id: thread_id.map(str::to_string),
        }
    }

    pub fn remote(workspace: WorkspaceEntry, thread_id: &str) -> Self {
        Self::new(BackendMode::Remote, Some(workspace), Some(thread_id))
    }

    pub fn workspace_id(&self) -> Option<&str> {
        self.workspace
            .as_ref()
            .map(|workspace| workspace.id.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn selected_thread_id(&self) -> Option<&str> {
        self.thread_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn session_connected(&self) -> bool {
        self.workspace
            .as_ref()
            .is_some_and(|workspace| workspace.connected)
    }

    pub fn resting_state(&self) -> ConnectionState {
        ConnectionState::resting(self.mode, self.session_connected())
    }

    /// Key that should be subscribed for this selection, if any.
    pub fn subscription_key(&self) -> Option<SubscriptionKey> {
        if !self.mode.is_remote() {
            return None;
        }
        let workspace_id = self.workspace_id()?;
        let thread_id = self.selected_thread_id()?;
        SubscriptionKey::new(workspace_id, thread_id).ok()
    }

    pub fn signature(&self) -> SelectionSignature {
        SelectionSignature {
            mode: self.mode,
            workspace_id: self.workspace_id().map(str::to_string),
            thread_id: self.selected_thread_id().map(str::to_string),
            workspace_connected: self.session_connected(),
        }
    }
}
