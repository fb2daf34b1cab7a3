/// Configuration for a [`TransactionCommitQueue`](crate::TransactionCommitQueue).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueConfig {
    dispatch_instantly: bool,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass buffering entirely and run every job at enqueue time,
    /// regardless of transaction depth. Useful for synchronous test
    /// environments.
    pub fn with_dispatch_instantly(mut self, dispatch_instantly: bool) -> Self {
        self.dispatch_instantly = dispatch_instantly;
        self
    }

    pub fn dispatch_instantly(&self) -> bool {
        self.dispatch_instantly
    }
}
