/// Errors that can occur within the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("storage: {entity} not found")]
    NotFound { entity: &'static str },

    /// An underlying database error.
    #[error("storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem error while preparing the data directory.
    #[error("storage: io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be interpreted.
    #[error("storage: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
