use uuid::Uuid;

/// Errors returned by console calls.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// The console deleted the source record (HTTP 410). Further updates are
    /// pointless.
    #[error("source {source_id} is gone")]
    SourceGone { source_id: Uuid },

    /// The console rejected the bearer token (HTTP 401).
    #[error("agent is not authorized by the console")]
    Unauthorized,

    /// Any other non-success response. Retryable.
    #[error("unexpected console response: status={status} body={body}")]
    Unexpected { status: u16, body: String },

    /// Transport-level failure. Retryable.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ConsoleError {
    /// Authoritative failures: the dispatcher stops permanently on these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsoleError::SourceGone { .. } | ConsoleError::Unauthorized
        )
    }
}
