//! Watermark store - persisted "read up to" timestamps per conversation

use crate::entities::unread_watermarks;
use crate::StoreConfig;
use anyhow::{Context, Result};
use sea_orm::*;
use sea_orm_migration::MigratorTrait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Keyed store of unread watermarks (conversation id -> epoch millis)
#[derive(Clone)]
pub struct WatermarkStore {
    pub(crate) db: DatabaseConnection,
}

impl WatermarkStore {
    /// Open (or create) the store at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        Self::with_config(StoreConfig { db_path }).await
    }

    /// Open the store described by `config` and run pending migrations
    pub async fn with_config(config: StoreConfig) -> Result<Self> {
        let db_path_str = config
            .db_path
            .to_str()
            .context("Invalid database path")?
            .replace("\\", "/");

        let db_url = format!("sqlite:{}?mode=rwc", db_path_str);

        let db: DatabaseConnection = Database::connect(db_url.as_str())
            .await
            .context("Failed to connect to database")?;

        crate::migration::Migrator::up(&db, None)
            .await
            .context("Failed to run migrations")?;

        info!("Watermark store initialized at {}", config.db_path.display());

        Ok(Self { db })
    }

    /// Create a store on top of an existing, already migrated connection
    pub fn with_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Current watermark for a conversation, if one was ever written
    pub async fn get(&self, conversation_id: &str) -> Result<Option<i64>, DbErr> {
        let row = unread_watermarks::Entity::find_by_id(conversation_id.to_string())
            .one(&self.db)
            .await?;

        Ok(row.map(|m| m.read_up_to))
    }

    /// Overwrite the watermark unconditionally
    ///
    /// Prefer [`WatermarkStore::advance`]; this exists for resets and tests.
    pub async fn set(&self, conversation_id: &str, read_up_to: i64) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;
        Self::write(&txn, conversation_id, read_up_to).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Move the watermark forward to `candidate` if it is newer
    ///
    /// The stored value never decreases. Returns the watermark in effect
    /// after the call.
    pub async fn advance(&self, conversation_id: &str, candidate: i64) -> Result<i64, DbErr> {
        let txn = self.db.begin().await?;

        let current = unread_watermarks::Entity::find_by_id(conversation_id.to_string())
            .one(&txn)
            .await?
            .map(|m| m.read_up_to);

        let next = match current {
            Some(current) if current >= candidate => {
                debug!(
                    conversation_id = %conversation_id,
                    current, candidate, "Watermark already ahead"
                );
                txn.commit().await?;
                return Ok(current);
            }
            _ => candidate,
        };

        Self::write(&txn, conversation_id, next).await?;
        txn.commit().await?;

        debug!(conversation_id = %conversation_id, read_up_to = next, "Watermark advanced");
        Ok(next)
    }

    /// Forget the watermark for a conversation
    pub async fn remove(&self, conversation_id: &str) -> Result<bool, DbErr> {
        let result = unread_watermarks::Entity::delete_by_id(conversation_id.to_string())
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// All stored watermarks
    pub async fn all(&self) -> Result<Vec<(String, i64)>, DbErr> {
        let rows = unread_watermarks::Entity::find()
            .order_by_asc(unread_watermarks::Column::ConversationId)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|m| (m.conversation_id, m.read_up_to))
            .collect())
    }

    /// Insert or overwrite the row in a single statement
    async fn write<C: ConnectionTrait>(
        conn: &C,
        conversation_id: &str,
        read_up_to: i64,
    ) -> Result<(), DbErr> {
        let row = unread_watermarks::ActiveModel {
            conversation_id: Set(conversation_id.to_string()),
            read_up_to: Set(read_up_to),
            updated_at: Set(chrono::Utc::now().timestamp_millis()),
        };

        unread_watermarks::Entity::insert(row)
            .on_conflict(
                sea_query::OnConflict::column(unread_watermarks::Column::ConversationId)
                    .update_columns([
                        unread_watermarks::Column::ReadUpTo,
                        unread_watermarks::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }
}
