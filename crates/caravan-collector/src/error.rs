/// Errors surfaced by the collector engine itself.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// A collection run is already connecting or collecting.
    #[error("collection already in progress")]
    CollectionInProgress,
}

/// Errors that can occur while talking to the inventory source (vCenter).
///
/// None of these are retried by the engine; they are recorded on the
/// collector status and the caller decides what to do next.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The endpoint URL could not be parsed.
    #[error("invalid vCenter URL: {0}")]
    InvalidUrl(String),

    /// The endpoint rejected the credentials.
    #[error("vCenter rejected the credentials")]
    InvalidCredentials,

    /// Non-success response from the vCenter API.
    #[error("vCenter API error: status={status} body={body}")]
    Api { status: u16, body: String },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The collected inventory could not be serialized.
    #[error("inventory serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
