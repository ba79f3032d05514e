//! Reverting approved changes
//!
//! Reverting applies the inverse of an approved mutation to the live entity
//! and drops the approved record. Same three entry points as approval.

use crate::change::{
    Actor, ApprovedChange, BatchExecutor, BatchOutcome, ChangeOperation, ChangeStore, ItemOutcome,
};
use crate::error::{not_found_error, validation_error, AppError};
use tracing::info;

#[derive(Clone)]
pub struct RevertCoordinator {
    store: ChangeStore,
    batch: BatchExecutor,
}

impl RevertCoordinator {
    pub fn new(store: ChangeStore, batch: BatchExecutor) -> Self {
        Self { store, batch }
    }

    pub async fn revert_one(&self, id: &str, actor: &Actor) -> Result<ApprovedChange, AppError> {
        let approved = self.load_approved(id).await?;
        self.revert_loaded(approved, actor).await
    }

    pub async fn revert_many(&self, ids: &[String], actor: &Actor) -> BatchOutcome {
        self.batch
            .run("revert", ids, |id| self.revert_if_approved(id, actor))
            .await
    }

    pub async fn revert_all(&self, ids: &[String], actor: &Actor) -> Result<BatchOutcome, AppError> {
        for id in ids {
            self.load_approved(id).await?;
        }

        Ok(self
            .batch
            .run("revert", ids, |id| async move {
                self.revert_one(&id, actor)
                    .await
                    .map(|_| ItemOutcome::Applied)
            })
            .await)
    }

    async fn revert_if_approved(&self, id: String, actor: &Actor) -> Result<ItemOutcome, AppError> {
        match self.store.get_approved(&id).await? {
            Some(approved) => self
                .revert_loaded(approved, actor)
                .await
                .map(|_| ItemOutcome::Applied),
            None => Ok(ItemOutcome::Skipped),
        }
    }

    async fn load_approved(&self, id: &str) -> Result<ApprovedChange, AppError> {
        if id.trim().is_empty() {
            return Err(validation_error("Approved change id is empty"));
        }
        self.store
            .get_approved(id)
            .await?
            .ok_or_else(|| not_found_error(format!("Approved change {} not found", id)))
    }

    async fn revert_loaded(
        &self,
        approved: ApprovedChange,
        actor: &Actor,
    ) -> Result<ApprovedChange, AppError> {
        actor.check_scope(&approved.change)?;

        let change = &approved.change;
        let entity_type = change.entity_type.as_str();
        let entity_id = change.entity_id.as_str();

        match change.operation {
            ChangeOperation::Create => {
                self.store.delete_entity(entity_type, entity_id).await?;
            }
            ChangeOperation::Update | ChangeOperation::Delete => {
                let old_entity = change.old_entity.as_ref().ok_or_else(|| {
                    validation_error(format!(
                        "{} change {} has no old entity to restore",
                        change.operation,
                        approved.id()
                    ))
                })?;
                self.store.put_entity(entity_type, entity_id, old_entity).await?;
            }
        }

        self.store.delete_approved(approved.id()).await?;
        info!(
            "Reverted {} change {} for {} {}",
            change.operation,
            approved.id(),
            entity_type,
            entity_id
        );
        Ok(approved)
    }
}

#[cfg(test)]
mod tests {
    use crate::change::models::fixtures::*;
    use crate::change::testing::{admin, harness, seed_change};
    use crate::change::{Actor, ChangeOperation};
    use crate::error::AppError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_then_revert_removes_entity() {
        let h = harness();
        seed_change(&h, "c1", ChangeOperation::Create, None, Some(profile("p1", "p1"))).await;
        h.service.approvals.approve_one("c1", &admin()).await.unwrap();
        assert!(h.store.get_entity(PROFILE, "p1").await.unwrap().is_some());

        let reverted = h.service.reverts.revert_one("c1", &admin()).await.unwrap();

        assert_eq!(reverted.id(), "c1");
        assert!(h.store.get_entity(PROFILE, "p1").await.unwrap().is_none());
        assert!(h.store.get_approved("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_then_revert_restores_old_state() {
        let h = harness();
        let old = profile("p1", "before");
        h.store.put_entity(PROFILE, "p1", &old).await.unwrap();
        seed_change(
            &h,
            "u1",
            ChangeOperation::Update,
            Some(old.clone()),
            Some(profile("p1", "after")),
        )
        .await;

        h.service.approvals.approve_one("u1", &admin()).await.unwrap();
        h.service.reverts.revert_one("u1", &admin()).await.unwrap();

        assert_eq!(h.store.get_entity(PROFILE, "p1").await.unwrap(), Some(old));
    }

    #[tokio::test]
    async fn test_delete_then_revert_recreates_entity() {
        let h = harness();
        let old = profile("p1", "kept");
        h.store.put_entity(PROFILE, "p1", &old).await.unwrap();
        seed_change(&h, "d1", ChangeOperation::Delete, Some(old.clone()), None).await;

        h.service.approvals.approve_one("d1", &admin()).await.unwrap();
        assert!(h.store.get_entity(PROFILE, "p1").await.unwrap().is_none());

        h.service.reverts.revert_one("d1", &admin()).await.unwrap();
        assert_eq!(h.store.get_entity(PROFILE, "p1").await.unwrap(), Some(old));
    }

    #[tokio::test]
    async fn test_double_revert_is_not_found() {
        let h = harness();
        seed_change(&h, "c1", ChangeOperation::Create, None, Some(profile("p1", "p1"))).await;
        h.service.approvals.approve_one("c1", &admin()).await.unwrap();
        h.service.reverts.revert_one("c1", &admin()).await.unwrap();

        let err = h.service.reverts.revert_one("c1", &admin()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_revert_scope_mismatch() {
        let h = harness();
        seed_change(&h, "c1", ChangeOperation::Create, None, Some(profile("p1", "p1"))).await;
        h.service.approvals.approve_one("c1", &admin()).await.unwrap();

        let actor = Actor::new("rdkcloud", Some("admin@example.com".to_string()));
        let err = h.service.reverts.revert_one("c1", &actor).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(h.store.get_approved("c1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_strict_and_tolerant_missing_id() {
        let h = harness();
        let ids = vec!["no-such-approved".to_string()];

        let err = h.service.reverts.revert_all(&ids, &admin()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let outcome = h.service.reverts.revert_many(&ids, &admin()).await;
        assert!(outcome.error_messages().is_empty());
        assert_eq!(outcome.skipped, ids);
    }

    #[tokio::test]
    async fn test_revert_many_reverts_resolved_ids() {
        let h = harness();
        for (id, entity) in [("c1", "p1"), ("c2", "p2")] {
            seed_change(&h, id, ChangeOperation::Create, None, Some(profile(entity, entity))).await;
            h.service.approvals.approve_one(id, &admin()).await.unwrap();
        }

        let ids = vec!["c1".to_string(), "missing".to_string(), "c2".to_string()];
        let outcome = h.service.reverts.revert_many(&ids, &admin()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.applied, vec!["c1".to_string(), "c2".to_string()]);
        assert!(h.store.list_approved().await.unwrap().is_empty());
    }
}
