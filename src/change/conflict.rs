//! Entity-level coordination between changes
//!
//! Groups changes by the entity they target, detects competing pending
//! changes and cleans up approved changes whose entity went away through
//! another path.

use crate::change::{
    Actor, BatchExecutor, BatchOutcome, Change, ChangeStore, EntityTarget, ItemOutcome,
};
use crate::error::{not_found_error, validation_error, AppError};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Bucket changes by target entity id, keeping input order inside each bucket
pub fn group_by_entity<T: EntityTarget + Clone>(changes: &[T]) -> BTreeMap<String, Vec<T>> {
    let mut grouped: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for change in changes {
        grouped
            .entry(change.entity_id().to_string())
            .or_default()
            .push(change.clone());
    }
    grouped
}

/// Target entity ids in input order
pub fn entity_ids_of<T: EntityTarget>(changes: &[T]) -> Vec<String> {
    changes.iter().map(|c| c.entity_id().to_string()).collect()
}

#[derive(Clone)]
pub struct ConflictResolver {
    store: ChangeStore,
    batch: BatchExecutor,
}

impl ConflictResolver {
    pub fn new(store: ChangeStore, batch: BatchExecutor) -> Self {
        Self { store, batch }
    }

    /// An existing pending change that would apply the same mutation
    pub async fn find_duplicate(&self, change: &Change) -> Result<Option<Change>, AppError> {
        Ok(self
            .store
            .list_changes_for(&change.application_type)
            .await?
            .into_iter()
            .find(|existing| existing.id != change.id && existing.same_mutation(change)))
    }

    /// Drop approved records for deleted entities, without reverting them.
    ///
    /// Only records in the actor's application type are touched, and only
    /// those of `entity_type` when one is given. Records are processed entity
    /// by entity; ids in `exclude_ids` are kept.
    pub async fn cancel_approved_changes_by_entity_id(
        &self,
        entity_ids: &[String],
        exclude_ids: &[String],
        entity_type: Option<&str>,
        actor: &Actor,
    ) -> Result<BatchOutcome, AppError> {
        if entity_ids.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let wanted: HashSet<&str> = entity_ids.iter().map(String::as_str).collect();
        let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();

        let matching: Vec<_> = self
            .store
            .list_approved_for(&actor.application_type)
            .await?
            .into_iter()
            .filter(|a| wanted.contains(a.entity_id()) && !excluded.contains(a.id()))
            .filter(|a| entity_type.map_or(true, |t| a.change.entity_type == t))
            .collect();

        let ordered: Vec<String> = group_by_entity(&matching)
            .into_values()
            .flatten()
            .map(|a| a.id().to_string())
            .collect();

        let outcome = self
            .batch
            .run("cancel", &ordered, |id| async move {
                debug!("Canceling approved change {}", id);
                self.store
                    .delete_approved(&id)
                    .await
                    .map(|_| ItemOutcome::Applied)
            })
            .await;

        info!(
            "Canceled {} approved changes for {} entities",
            outcome.applied.len(),
            entity_ids.len()
        );
        Ok(outcome)
    }

    /// Pending changes targeting any of `entity_ids`.
    ///
    /// NotFound only when none of the requested ids has a pending change.
    pub async fn changes_by_entity_ids(&self, entity_ids: &[String]) -> Result<Vec<Change>, AppError> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: HashSet<&str> = entity_ids.iter().map(String::as_str).collect();
        let changes: Vec<Change> = self
            .store
            .list_changes()
            .await?
            .into_iter()
            .filter(|c| wanted.contains(c.entity_id.as_str()))
            .collect();

        if changes.is_empty() {
            return Err(not_found_error(format!(
                "No changes found for entities {}",
                entity_ids.join(", ")
            )));
        }
        Ok(changes)
    }

    /// Withdraw a pending change
    pub async fn cancel_change(&self, id: &str, actor: &Actor) -> Result<Change, AppError> {
        if id.trim().is_empty() {
            return Err(validation_error("Change id is empty"));
        }
        let change = self
            .store
            .get_change(id)
            .await?
            .ok_or_else(|| not_found_error(format!("Change {} not found", id)))?;
        actor.check_scope(&change)?;

        self.store.delete_change(id).await?;
        info!("Canceled pending change {} for entity {}", id, change.entity_id);
        Ok(change)
    }

    /// Distinct entity ids with pending changes, in first-seen order
    pub async fn changed_entity_ids(&self, application_type: &str) -> Result<Vec<String>, AppError> {
        let mut seen = HashSet::new();
        Ok(entity_ids_of(&self.store.list_changes_for(application_type).await?)
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }
}
