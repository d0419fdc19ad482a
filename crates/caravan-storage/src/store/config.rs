use caravan_common::types::AgentMode;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, EntityTrait};

use crate::entities::configuration::{ActiveModel, Column, Entity};
use crate::error::StorageError;
use crate::store::{Store, SINGLETON_ROW_ID};

/// The persisted agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub agent_mode: AgentMode,
}

impl Store {
    /// Retrieves the stored configuration.
    ///
    /// Returns [`StorageError::NotFound`] when no mode has been saved yet;
    /// callers fall back to their configured default.
    pub async fn get_configuration(&self) -> Result<Configuration, StorageError> {
        let model = Entity::find_by_id(SINGLETON_ROW_ID)
            .one(self.db())
            .await?
            .ok_or(StorageError::NotFound {
                entity: "configuration",
            })?;

        let agent_mode = model
            .agent_mode
            .parse()
            .map_err(|_| StorageError::Corrupt(format!("invalid agent mode '{}'", model.agent_mode)))?;

        Ok(Configuration { agent_mode })
    }

    /// Stores or updates the configuration. Concurrent saves all succeed;
    /// the visible value is the last committed write.
    pub async fn save_configuration(&self, mode: AgentMode) -> Result<(), StorageError> {
        let now = Utc::now().fixed_offset();
        let model = ActiveModel {
            id: Set(SINGLETON_ROW_ID),
            agent_mode: Set(mode.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Entity::insert(model)
            .on_conflict(
                OnConflict::column(Column::Id)
                    .update_columns([Column::AgentMode, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;

        Ok(())
    }
}
