/// Outcome errors delivered through a [`crate::WorkFuture`].
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    /// The work was canceled, either through its own future or because the
    /// scheduler shut down before (or while) it ran.
    #[error("work canceled")]
    Canceled,

    /// The work function panicked. The panic payload is captured so callers
    /// can surface it like any other failure.
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The work function returned an error of its own.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl WorkError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, WorkError::Canceled)
    }
}
