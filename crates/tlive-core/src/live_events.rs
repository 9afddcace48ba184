use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const METHOD_SESSION_CONNECTED: &str = "codex/connected";
pub const METHOD_LIVE_ATTACHED: &str = "thread/live_attached";
pub const METHOD_LIVE_DETACHED: &str = "thread/live_detached";
pub const METHOD_LIVE_HEARTBEAT: &str = "thread/live_heartbeat";
pub const METHOD_ERROR: &str = "error";

/// Notification delivered by the backend event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveEvent {
    #[serde(alias = "workspaceId")]
    pub workspace_id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl LiveEvent {
    pub fn new(workspace_id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn for_thread(workspace_id: &str, method: &str, thread_id: &str) -> Self {
        Self::new(
            workspace_id,
            method,
            serde_json::json!({ "threadId": thread_id }),
        )
    }

    pub fn kind(&self) -> Option<LiveMethod> {
        LiveMethod::classify(&self.method)
    }

    /// Thread id carried by the event, looked up where its method puts it.
    pub fn thread_id(&self) -> Option<&str> {
        let kind = self.kind()?;
        if kind.nests_thread_in_turn() {
            if let Some(id) = self.params.get("turn").and_then(thread_id_field) {
                return Some(id);
            }
        }
        thread_id_field(&self.params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveMethod {
    SessionConnected,
    Attached,
    Detached,
    Heartbeat,
    ItemActivity,
    TurnActivity,
    Error,
}

impl LiveMethod {
    pub fn classify(method: &str) -> Option<Self> {
        let method = method.trim();
        match method {
            METHOD_SESSION_CONNECTED => return Some(LiveMethod::SessionConnected),
            METHOD_LIVE_ATTACHED => return Some(LiveMethod::Attached),
            METHOD_LIVE_DETACHED => return Some(LiveMethod::Detached),
            METHOD_LIVE_HEARTBEAT => return Some(LiveMethod::Heartbeat),
            METHOD_ERROR => return Some(LiveMethod::Error),
            _ => {}
        }
        if method.starts_with("item/") {
            Some(LiveMethod::ItemActivity)
        } else if method.starts_with("turn/") {
            Some(LiveMethod::TurnActivity)
        } else {
            None
        }
    }

    /// Whether the event scopes itself to a thread at all.
    pub fn is_thread_scoped(&self) -> bool {
        !matches!(self, LiveMethod::SessionConnected)
    }

    /// Item, turn and error traffic counts as proof of liveness.
    pub fn is_activity(&self) -> bool {
        matches!(
            self,
            LiveMethod::ItemActivity | LiveMethod::TurnActivity | LiveMethod::Error
        )
    }

    fn nests_thread_in_turn(&self) -> bool {
        matches!(self, LiveMethod::TurnActivity | LiveMethod::Error)
    }
}

fn thread_id_field(value: &Value) -> Option<&str> {
    value
        .get("threadId")
        .or_else(|| value.get("thread_id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_lifecycle_and_activity_methods() {
        assert_eq!(
            LiveMethod::classify("codex/connected"),
            Some(LiveMethod::SessionConnected)
        );
        assert_eq!(
            LiveMethod::classify("thread/live_heartbeat"),
            Some(LiveMethod::Heartbeat)
        );
        assert_eq!(
            LiveMethod::classify("item/agentMessage/delta"),
            Some(LiveMethod::ItemActivity)
        );
        assert_eq!(
            LiveMethod::classify("turn/completed"),
            Some(LiveMethod::TurnActivity)
        );
        assert_eq!(LiveMethod::classify("error"), Some(LiveMethod::Error));
        assert_eq!(LiveMethod::classify("thread/started"), None);
        assert_eq!(LiveMethod::classify("account/updated"), None);
    }

    #[test]
    fn turn_and_error_events_read_nested_thread_id() {
        let turn = LiveEvent::new(
            "ws-1",
            "turn/started",
            json!({"turn": {"id": "turn-9", "threadId": "thread-1"}}),
        );
        assert_eq!(turn.thread_id(), Some("thread-1"));

        let error = LiveEvent::new(
            "ws-1",
            "error",
            json!({"error": {"message": "boom"}, "turn": {"thread_id": "thread-2"}}),
        );
        assert_eq!(error.thread_id(), Some("thread-2"));

        let flat_turn = LiveEvent::new("ws-1", "turn/diff/updated", json!({"threadId": "thread-3"}));
        assert_eq!(flat_turn.thread_id(), Some("thread-3"));
    }

    #[test]
    fn other_events_read_direct_thread_id() {
        let heartbeat = LiveEvent::for_thread("ws-1", "thread/live_heartbeat", "thread-1");
        assert_eq!(heartbeat.thread_id(), Some("thread-1"));

        let nested_only = LiveEvent::new(
            "ws-1",
            "item/started",
            json!({"turn": {"threadId": "thread-1"}}),
        );
        assert_eq!(nested_only.thread_id(), None);
    }

    #[test]
    fn blank_or_unknown_yields_no_thread_id() {
        let blank = LiveEvent::new("ws-1", "thread/live_detached", json!({"threadId": "  "}));
        assert_eq!(blank.thread_id(), None);

        let missing = LiveEvent::new("ws-1", "thread/live_detached", Value::Null);
        assert_eq!(missing.thread_id(), None);

        let unknown = LiveEvent::new("ws-1", "thread/archived", json!({"threadId": "thread-1"}));
        assert_eq!(unknown.thread_id(), None);
    }

    #[test]
    fn deserializes_camel_case_workspace_and_missing_params() {
        let event: LiveEvent =
            serde_json::from_str(r#"{"workspaceId":"ws-1","method":"codex/connected"}"#)
                .expect("parse");
        assert_eq!(event.workspace_id, "ws-1");
        assert_eq!(event.params, Value::Null);
        assert_eq!(event.kind(), Some(LiveMethod::SessionConnected));
    }
}
