//! Change approval
//!
//! Promotes a pending change into the approved namespace and applies its
//! mutation to the live entity. Three entry points:
//! - `approve_one`: strict single item, every failure surfaces.
//! - `approve_many`: tolerant batch, ids without a pending change are skipped.
//! - `approve_all`: strict batch, an unresolved id fails the whole call up front.

use crate::change::{
    Actor, ApprovedChange, BatchExecutor, BatchOutcome, Change, ChangeOperation, ChangeStore,
    Clock, EntitySnapshot, ItemOutcome,
};
use crate::error::{conflict_error, not_found_error, validation_error, AppError};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApprovalCoordinator {
    store: ChangeStore,
    batch: BatchExecutor,
    clock: Arc<dyn Clock>,
}

impl ApprovalCoordinator {
    pub fn new(store: ChangeStore, batch: BatchExecutor, clock: Arc<dyn Clock>) -> Self {
        Self { store, batch, clock }
    }

    pub async fn approve_one(&self, id: &str, actor: &Actor) -> Result<ApprovedChange, AppError> {
        let change = self.load_pending(id).await?;
        self.approve_loaded(change, actor).await
    }

    pub async fn approve_many(&self, ids: &[String], actor: &Actor) -> BatchOutcome {
        self.batch
            .run("approve", ids, |id| self.approve_if_pending(id, actor))
            .await
    }

    pub async fn approve_all(&self, ids: &[String], actor: &Actor) -> Result<BatchOutcome, AppError> {
        for id in ids {
            self.load_pending(id).await?;
        }

        Ok(self
            .batch
            .run("approve", ids, |id| async move {
                self.approve_one(&id, actor)
                    .await
                    .map(|_| ItemOutcome::Applied)
            })
            .await)
    }

    async fn approve_if_pending(&self, id: String, actor: &Actor) -> Result<ItemOutcome, AppError> {
        match self.store.get_change(&id).await? {
            Some(change) => self
                .approve_loaded(change, actor)
                .await
                .map(|_| ItemOutcome::Applied),
            None => Ok(ItemOutcome::Skipped),
        }
    }

    async fn load_pending(&self, id: &str) -> Result<Change, AppError> {
        if id.trim().is_empty() {
            return Err(validation_error("Change id is empty"));
        }
        self.store
            .get_change(id)
            .await?
            .ok_or_else(|| not_found_error(format!("Change {} not found", id)))
    }

    async fn approve_loaded(&self, change: Change, actor: &Actor) -> Result<ApprovedChange, AppError> {
        let approver = actor.approver()?;
        actor.check_scope(&change)?;

        if self.store.get_approved(&change.id).await?.is_some() {
            return Err(conflict_error(format!(
                "Change {} is already approved",
                change.id
            )));
        }

        let approved = ApprovedChange::new(change, approver, self.clock.now());
        approved.validate()?;

        let previous = self.apply(&approved.change).await?;
        if let Err(e) = self.store.save_approved(&approved).await {
            self.restore(&approved.change, previous).await;
            return Err(e);
        }
        if let Err(e) = self.store.delete_change(approved.id()).await {
            if let Err(undo) = self.store.delete_approved(approved.id()).await {
                error!("Failed to drop approved record {}: {}", approved.id(), undo);
            }
            self.restore(&approved.change, previous).await;
            return Err(e);
        }

        info!(
            "Approved {} change {} for {} {} (approved by {})",
            approved.change.operation,
            approved.id(),
            approved.change.entity_type,
            approved.change.entity_id,
            approved.approved_user
        );
        Ok(approved)
    }

    /// Write the change's effect to the live entity namespace and return the
    /// entity as it was before
    async fn apply(&self, change: &Change) -> Result<Option<EntitySnapshot>, AppError> {
        let entity_type = change.entity_type.as_str();
        let entity_id = change.entity_id.as_str();
        let live = self.store.get_entity(entity_type, entity_id).await?;

        match change.operation {
            ChangeOperation::Create => {
                if live.is_some() {
                    return Err(conflict_error(format!(
                        "{} {} already exists",
                        entity_type, entity_id
                    )));
                }
                let new_entity = change
                    .new_entity
                    .as_ref()
                    .ok_or_else(|| validation_error("Create change has no new entity"))?;
                self.store.put_entity(entity_type, entity_id, new_entity).await?;
            }
            ChangeOperation::Update => {
                if live.is_none() {
                    return Err(not_found_error(format!(
                        "{} {} does not exist",
                        entity_type, entity_id
                    )));
                }
                let new_entity = change
                    .new_entity
                    .as_ref()
                    .ok_or_else(|| validation_error("Update change has no new entity"))?;
                self.store.put_entity(entity_type, entity_id, new_entity).await?;
            }
            ChangeOperation::Delete => {
                if live.is_none() {
                    return Err(not_found_error(format!(
                        "{} {} does not exist",
                        entity_type, entity_id
                    )));
                }
                self.store.delete_entity(entity_type, entity_id).await?;
            }
        }
        Ok(live)
    }

    /// Put the live entity back to `previous` after a failed approval
    async fn restore(&self, change: &Change, previous: Option<EntitySnapshot>) {
        let entity_type = change.entity_type.as_str();
        let entity_id = change.entity_id.as_str();
        let restored = match &previous {
            Some(snapshot) => self.store.put_entity(entity_type, entity_id, snapshot).await,
            None => self.store.delete_entity(entity_type, entity_id).await,
        };
        match restored {
            Ok(()) => warn!(
                "Rolled back {} {} after failed approval of {}",
                entity_type, entity_id, change.id
            ),
            Err(e) => error!(
                "Failed to roll back {} {} after failed approval of {}: {}",
                entity_type, entity_id, change.id, e
            ),
        }
    }
}
