use std::path::Path;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use crate::error::StorageError;

pub mod config;
pub mod inventory;

pub use config::Configuration;
pub use inventory::InventoryRecord;

/// Both tables carry `CHECK (id = 1)`; every write targets this row.
pub(crate) const SINGLETON_ROW_ID: i32 = 1;

/// Unified access layer for the agent database (`agent.db`).
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    /// Connects and initializes the agent database.
    ///
    /// Runs all pending `sea-orm-migration` migrations so the schema is
    /// current before the first query.
    pub async fn new(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("agent.db");
        let url = format!(
            "sqlite://{}?mode=rwc",
            db_path
                .to_str()
                .ok_or_else(|| StorageError::Corrupt("non-UTF-8 data_dir path".to_string()))?
        );
        let db = Database::connect(&url).await?;

        db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        Migrator::up(&db, None).await?;

        tracing::info!(path = %db_path.display(), "agent store initialized");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
