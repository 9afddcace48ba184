use std::collections::HashMap;
use std::time::Duration;
use tlive_core::SubscriptionKey;
use tokio::time::Instant;

/// Keys we unsubscribed ourselves, with the instant after which a detach
/// notification for them counts as backend-initiated again.
#[derive(Debug)]
pub struct SelfDetachWindow {
    window: Duration,
    entries: HashMap<SubscriptionKey, Instant>,
}

impl SelfDetachWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// A second record for the same key replaces the first.
    pub fn record(&mut self, key: SubscriptionKey, now: Instant) {
        self.prune(now);
        self.entries.insert(key, now + self.window);
    }

    /// Returns true when the detach should be ignored. The entry is spent either way.
    pub fn consume(&mut self, key: &SubscriptionKey, now: Instant) -> bool {
        match self.entries.remove(key) {
            Some(expires_at) => now < expires_at,
            None => false,
        }
    }

    pub fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, expires_at| now < *expires_at);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
