use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, EntityTrait};

use crate::entities::inventory::{ActiveModel, Column, Entity, Model};
use crate::error::StorageError;
use crate::store::{Store, SINGLETON_ROW_ID};

/// The collected inventory snapshot. The blob is opaque to the store; its
/// shape belongs to the inventory producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_record(model: Model) -> InventoryRecord {
    InventoryRecord {
        data: model.data,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    /// Retrieves the stored inventory snapshot.
    pub async fn get_inventory(&self) -> Result<InventoryRecord, StorageError> {
        let model = Entity::find_by_id(SINGLETON_ROW_ID)
            .one(self.db())
            .await?
            .ok_or(StorageError::NotFound { entity: "inventory" })?;
        Ok(to_record(model))
    }

    /// Stores or replaces the inventory snapshot. `updated_at` is refreshed
    /// on every write; `created_at` keeps the value of the first write.
    pub async fn save_inventory(&self, data: &[u8]) -> Result<(), StorageError> {
        let now = Utc::now().fixed_offset();
        let model = ActiveModel {
            id: Set(SINGLETON_ROW_ID),
            data: Set(data.to_vec()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Entity::insert(model)
            .on_conflict(
                OnConflict::column(Column::Id)
                    .update_columns([Column::Data, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db())
            .await?;

        Ok(())
    }
}
