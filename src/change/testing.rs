//! Test doubles shared by the workflow tests

use crate::change::models::fixtures;
use crate::change::{
    Actor, Change, ChangeOperation, ChangeService, ChangeStore, Clock, EntitySnapshot, IdGenerator,
};
use crate::error::AppError;
use crate::store::{EntityStore, MemoryEntityStore, Namespace};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Starts at `fixtures::at(0)` and advances one second per reading
#[derive(Default)]
pub struct StepClock {
    ticks: AtomicI64,
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        fixtures::at(0) + Duration::seconds(self.ticks.fetch_add(1, Ordering::SeqCst))
    }
}

/// `gen-1`, `gen-2`, ...
#[derive(Default)]
pub struct SequenceIds {
    next: AtomicUsize,
}

impl IdGenerator for SequenceIds {
    fn generate(&self) -> String {
        format!("gen-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// In-memory store whose writes fail for chosen ids, in every namespace or
/// in one
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: MemoryEntityStore,
    failing: Arc<RwLock<HashSet<(Option<Namespace>, String)>>>,
}

impl FaultyStore {
    pub async fn fail_writes_to(&self, id: &str) {
        self.failing.write().await.insert((None, id.to_string()));
    }

    pub async fn fail_writes_in(&self, namespace: Namespace, id: &str) {
        self.failing
            .write()
            .await
            .insert((Some(namespace), id.to_string()));
    }

    pub async fn heal(&self) {
        self.failing.write().await.clear();
    }

    async fn check(&self, namespace: &Namespace, id: &str) -> Result<(), AppError> {
        let failing = self.failing.read().await;
        if failing.contains(&(None, id.to_string()))
            || failing.contains(&(Some(namespace.clone()), id.to_string()))
        {
            return Err(AppError::Internal(format!(
                "injected write failure for {} in {}",
                id, namespace
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Value>, AppError> {
        self.inner.get(namespace, id).await
    }

    async fn set(&self, namespace: &Namespace, id: &str, value: Value) -> Result<(), AppError> {
        self.check(namespace, id).await?;
        self.inner.set(namespace, id, value).await
    }

    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<(), AppError> {
        self.check(namespace, id).await?;
        self.inner.delete(namespace, id).await
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<Value>, AppError> {
        self.inner.list(namespace).await
    }
}

pub struct Harness {
    pub service: ChangeService,
    pub store: ChangeStore,
    pub faults: FaultyStore,
}

pub fn harness() -> Harness {
    let faults = FaultyStore::default();
    let backing: Arc<dyn EntityStore> = Arc::new(faults.clone());
    Harness {
        service: ChangeService::with_parts(
            backing.clone(),
            "stb",
            CancellationToken::new(),
            Arc::new(SequenceIds::default()),
            Arc::new(StepClock::default()),
        ),
        store: ChangeStore::new(backing),
        faults,
    }
}

pub fn admin() -> Actor {
    Actor::new("stb", Some("admin@example.com".to_string()))
}

/// Write a pending change directly, bypassing creation checks
pub async fn seed(h: &Harness, change: Change) {
    h.store.save_change(&change).await.unwrap();
}

pub async fn seed_change(
    h: &Harness,
    id: &str,
    operation: ChangeOperation,
    old: Option<EntitySnapshot>,
    new: Option<EntitySnapshot>,
) {
    seed(h, fixtures::change(id, operation, old, new, "author")).await;
}
