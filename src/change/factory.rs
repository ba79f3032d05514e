//! Change creation
//!
//! Turns a proposed entity mutation into a persisted pending [`Change`].

use crate::change::{Change, ChangeOperation, ChangeStore, ConflictResolver, EntitySnapshot};
use crate::error::{conflict_error, AppError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Source of change ids for callers that supply none
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Source of timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A proposed mutation, as received from the admin layer
#[derive(Debug, Clone)]
pub struct NewChange {
    /// Generated when absent or blank
    pub id: Option<String>,
    pub operation: ChangeOperation,
    pub entity_type: String,
    pub old_entity: Option<EntitySnapshot>,
    pub new_entity: Option<EntitySnapshot>,
    pub application_type: String,
    pub author: String,
}

#[derive(Clone)]
pub struct ChangeFactory {
    store: ChangeStore,
    conflicts: ConflictResolver,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl ChangeFactory {
    pub fn new(
        store: ChangeStore,
        conflicts: ConflictResolver,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            conflicts,
            ids,
            clock,
        }
    }

    /// Build, check and persist a pending change
    pub async fn create_change(&self, proposed: NewChange) -> Result<Change, AppError> {
        let id = match proposed.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => self.ids.generate(),
        };

        let entity_id = proposed
            .new_entity
            .as_ref()
            .and_then(|s| s.id())
            .or_else(|| proposed.old_entity.as_ref().and_then(|s| s.id()))
            .unwrap_or_default()
            .to_string();

        let change = Change {
            id,
            entity_id,
            entity_type: proposed.entity_type,
            application_type: proposed.application_type,
            author: proposed.author,
            operation: proposed.operation,
            old_entity: proposed.old_entity,
            new_entity: proposed.new_entity,
            timestamp: self.clock.now(),
        };
        change.validate()?;

        if self.store.get_change(&change.id).await?.is_some() {
            return Err(conflict_error(format!("Change {} already exists", change.id)));
        }
        if let Some(existing) = self.conflicts.find_duplicate(&change).await? {
            return Err(conflict_error(format!(
                "Change with the same data already exists: {}",
                existing.id
            )));
        }

        self.store.save_change(&change).await?;
        info!(
            "Created {} change {} for {} {} by {}",
            change.operation, change.id, change.entity_type, change.entity_id, change.author
        );
        Ok(change)
    }
}
