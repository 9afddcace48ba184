/// Monotonic attempt counter; anything started under an older value is stale.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGuard {
    current: u64,
}

impl SequenceGuard {
    pub fn advance(&mut self) -> u64 {
        self.current = self.current.saturating_add(1);
        self.current
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn is_current(&self, sequence: u64) -> bool {
        self.current == sequence
    }
}
