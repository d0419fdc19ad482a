use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SourceError;

/// Credentials for a vCenter endpoint, as submitted through the local API.
#[derive(Clone, Deserialize)]
pub struct VCenterCredentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for VCenterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VCenterCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Producer of the inventory blob.
///
/// Implementations must be safe to share across threads: the engine calls
/// them from scheduler work units. Cancellation is handled by the engine,
/// which races these futures against the work unit's token.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Validates that the endpoint is reachable and the credentials are
    /// accepted. Does not collect anything.
    async fn check_credentials(&self, credentials: &VCenterCredentials) -> Result<(), SourceError>;

    /// Captures a full inventory snapshot and returns it as an opaque JSON
    /// blob.
    async fn fetch_inventory(
        &self,
        credentials: &VCenterCredentials,
    ) -> Result<Vec<u8>, SourceError>;
}
