//! PostgreSQL entity store
//!
//! All namespaces share one JSONB key/value table.

use crate::error::AppError;
use crate::store::{EntityStore, Namespace};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde_json::Value;
use tracing::{debug, info};

/// Entity store backed by a deadpool-postgres pool
pub struct PgEntityStore {
    pool: Pool,
}

impl PgEntityStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the backing table if it doesn't exist
    pub async fn init_schema(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;

        client
            .execute(
                "CREATE TABLE IF NOT EXISTS entity_store (
                    namespace VARCHAR(255) NOT NULL,
                    id VARCHAR(255) NOT NULL,
                    value JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    PRIMARY KEY (namespace, id)
                )",
                &[],
            )
            .await?;

        info!("Entity store table initialized");
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Value>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT value FROM entity_store WHERE namespace = $1 AND id = $2",
                &[&namespace.key(), &id],
            )
            .await?;

        Ok(row.map(|r| r.get::<_, Value>(0)))
    }

    async fn set(&self, namespace: &Namespace, id: &str, value: Value) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO entity_store (namespace, id, value, updated_at)
                 VALUES ($1, $2, $3, CURRENT_TIMESTAMP)
                 ON CONFLICT (namespace, id)
                 DO UPDATE SET value = EXCLUDED.value, updated_at = CURRENT_TIMESTAMP",
                &[&namespace.key(), &id, &value],
            )
            .await?;

        debug!("Stored {}/{}", namespace, id);
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "DELETE FROM entity_store WHERE namespace = $1 AND id = $2",
                &[&namespace.key(), &id],
            )
            .await?;

        debug!("Deleted {}/{}", namespace, id);
        Ok(())
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<Value>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT value FROM entity_store WHERE namespace = $1 ORDER BY id",
                &[&namespace.key()],
            )
            .await?;

        Ok(rows.iter().map(|r| r.get::<_, Value>(0)).collect())
    }
}
