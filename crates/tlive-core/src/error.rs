use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("workspace id is empty")]
    EmptyWorkspaceId,
    #[error("thread id is empty")]
    EmptyThreadId,
    #[error("malformed subscription key: {0}")]
    Malformed(String),
}

/// Failure reported by a remote collaborator (subscribe, refresh, session reconnect).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("workspace session not connected: {0}")]
    NotConnected(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out: {0}")]
    Timeout(String),
}

impl BackendError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }
}
