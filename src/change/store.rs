//! Change storage
//!
//! Typed access to the pending and approved namespaces and to live entities,
//! layered over an injected [`EntityStore`].

use crate::change::{ApprovedChange, Change, EntitySnapshot};
use crate::error::AppError;
use crate::store::{EntityStore, Namespace};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ChangeStore {
    store: Arc<dyn EntityStore>,
}

impl ChangeStore {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // PENDING CHANGES
    // =========================================================================

    pub async fn get_change(&self, id: &str) -> Result<Option<Change>, AppError> {
        match self.store.get(&Namespace::PendingChanges, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn save_change(&self, change: &Change) -> Result<(), AppError> {
        let value = serde_json::to_value(change)?;
        self.store
            .set(&Namespace::PendingChanges, &change.id, value)
            .await?;
        debug!("Saved pending change {} for entity {}", change.id, change.entity_id);
        Ok(())
    }

    pub async fn delete_change(&self, id: &str) -> Result<(), AppError> {
        self.store.delete(&Namespace::PendingChanges, id).await
    }

    pub async fn list_changes(&self) -> Result<Vec<Change>, AppError> {
        self.store
            .list(&Namespace::PendingChanges)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(AppError::from))
            .collect()
    }

    /// Pending changes of one application type
    pub async fn list_changes_for(&self, application_type: &str) -> Result<Vec<Change>, AppError> {
        let application_type = application_type.to_string();
        self.store
            .list_filtered(&Namespace::PendingChanges, &move |v| {
                v.get("applicationType").and_then(|a| a.as_str()) == Some(application_type.as_str())
            })
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(AppError::from))
            .collect()
    }

    // =========================================================================
    // APPROVED CHANGES
    // =========================================================================

    pub async fn get_approved(&self, id: &str) -> Result<Option<ApprovedChange>, AppError> {
        match self.store.get(&Namespace::ApprovedChanges, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn save_approved(&self, approved: &ApprovedChange) -> Result<(), AppError> {
        let value = serde_json::to_value(approved)?;
        self.store
            .set(&Namespace::ApprovedChanges, approved.id(), value)
            .await?;
        debug!("Saved approved change {}", approved.id());
        Ok(())
    }

    pub async fn delete_approved(&self, id: &str) -> Result<(), AppError> {
        self.store.delete(&Namespace::ApprovedChanges, id).await
    }

    pub async fn list_approved(&self) -> Result<Vec<ApprovedChange>, AppError> {
        self.store
            .list(&Namespace::ApprovedChanges)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(AppError::from))
            .collect()
    }

    pub async fn list_approved_for(
        &self,
        application_type: &str,
    ) -> Result<Vec<ApprovedChange>, AppError> {
        let application_type = application_type.to_string();
        self.store
            .list_filtered(&Namespace::ApprovedChanges, &move |v| {
                v.get("applicationType").and_then(|a| a.as_str()) == Some(application_type.as_str())
            })
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(AppError::from))
            .collect()
    }

    // =========================================================================
    // LIVE ENTITIES
    // =========================================================================

    pub async fn get_entity(
        &self,
        entity_type: &str,
        id: &str,
    ) -> Result<Option<EntitySnapshot>, AppError> {
        Ok(self
            .store
            .get(&Namespace::entities(entity_type), id)
            .await?
            .map(EntitySnapshot::new))
    }

    pub async fn put_entity(
        &self,
        entity_type: &str,
        id: &str,
        snapshot: &EntitySnapshot,
    ) -> Result<(), AppError> {
        self.store
            .set(&Namespace::entities(entity_type), id, snapshot.payload().clone())
            .await
    }

    pub async fn delete_entity(&self, entity_type: &str, id: &str) -> Result<(), AppError> {
        self.store.delete(&Namespace::entities(entity_type), id).await
    }
}
