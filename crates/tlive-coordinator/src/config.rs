use std::time::Duration;

pub const DEFAULT_SELF_DETACH_WINDOW: Duration = Duration::from_secs(10);
pub const SELF_DETACH_ENV: &str = "TLIVE_SELF_DETACH_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long our own unsubscribe keeps the matching detach notification muted.
    pub self_detach_window: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            self_detach_window: DEFAULT_SELF_DETACH_WINDOW,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        Self {
            self_detach_window: resolve_self_detach_window(std::env::var(SELF_DETACH_ENV).ok()),
        }
    }

    pub fn with_self_detach_window(mut self, window: Duration) -> Self {
        self.self_detach_window = window;
        self
    }
}

fn resolve_self_detach_window(raw: Option<String>) -> Duration {
    raw.as_deref()
        .and_then(parse_millis)
        .unwrap_or(DEFAULT_SELF_DETACH_WINDOW)
}

pub fn parse_millis(value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_to_ten_seconds() {
        assert_eq!(
            CoordinatorConfig::default().self_detach_window,
            Duration::from_secs(10)
        );
        assert_eq!(resolve_self_detach_window(None), DEFAULT_SELF_DETACH_WINDOW);
    }

    #[test]
    fn window_override_must_be_positive_millis() {
        assert_eq!(
            resolve_self_detach_window(Some(" 2500 ".to_string())),
            Duration::from_millis(2500)
        );
        assert_eq!(
            resolve_self_detach_window(Some("0".to_string())),
            DEFAULT_SELF_DETACH_WINDOW
        );
        assert_eq!(
            resolve_self_detach_window(Some("soon".to_string())),
            DEFAULT_SELF_DETACH_WINDOW
        );
    }
}
