use tokio_util::sync::CancellationToken;

/// Execution context handed to a running job.
#[derive(Clone)]
pub struct JobContext {
    cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }

    /// Whether shutdown was requested. Long-running jobs should check this
    /// between units of work and bail out early.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }
}
