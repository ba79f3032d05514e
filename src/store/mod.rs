//! Keyed entity storage
//!
//! The change workflow never owns live configuration state directly. Every read
//! and write goes through an [`EntityStore`], which guarantees atomic per-key
//! get/set/delete. Callers inject the store; nothing here is global.

mod memory;
mod postgres;

pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Logical partition of the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Proposed, not yet authoritative changes
    PendingChanges,
    /// Changes accepted by an approving user
    ApprovedChanges,
    /// Live configuration entities of one entity type
    Entities(String),
}

impl Namespace {
    pub fn entities(entity_type: impl Into<String>) -> Self {
        Namespace::Entities(entity_type.into())
    }

    /// Key used by persistent backends
    pub fn key(&self) -> String {
        match self {
            Namespace::PendingChanges => "change".to_string(),
            Namespace::ApprovedChanges => "approved_change".to_string(),
            Namespace::Entities(entity_type) => format!("entity:{}", entity_type),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Keyed document store shared by pending, approved and live namespaces.
///
/// `get` returns either the current value or `None`, never a torn read.
/// Deleting an absent key is not an error.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Value>, AppError>;

    async fn set(&self, namespace: &Namespace, id: &str, value: Value) -> Result<(), AppError>;

    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<(), AppError>;

    async fn list(&self, namespace: &Namespace) -> Result<Vec<Value>, AppError>;

    async fn list_filtered(
        &self,
        namespace: &Namespace,
        predicate: &(dyn for<'v> Fn(&'v Value) -> bool + Send + Sync),
    ) -> Result<Vec<Value>, AppError> {
        let values = self.list(namespace).await?;
        Ok(values.into_iter().filter(|v| predicate(v)).collect())
    }
}
