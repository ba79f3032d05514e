//! Change data models
//!
//! A [`Change`] is a proposed mutation of one configuration entity. Entity
//! payloads are opaque to the workflow: they travel as an [`EntitySnapshot`]
//! tagged by the change's `entity_type` and are only decoded at the edges.

use crate::error::{validation_error, AppError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of mutation a change applies to its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Create => "CREATE",
            ChangeOperation::Update => "UPDATE",
            ChangeOperation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(ChangeOperation::Create),
            "UPDATE" => Ok(ChangeOperation::Update),
            "DELETE" => Ok(ChangeOperation::Delete),
            other => Err(validation_error(format!("Unknown change operation: {}", other))),
        }
    }
}

/// Serialized state of a configuration entity at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitySnapshot(Value);

impl EntitySnapshot {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    pub fn from_entity<T: Serialize>(entity: &T) -> Result<Self, AppError> {
        Ok(Self(serde_json::to_value(entity)?))
    }

    /// Logical id of the entity (`id` field of the payload)
    pub fn id(&self) -> Option<&str> {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
    }

    /// Display name of the entity, when the payload carries one
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.0
    }

    pub fn into_payload(self) -> Value {
        self.0
    }

    /// Decode into a concrete entity type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        Ok(serde_json::from_value(self.0.clone())?)
    }
}

/// A recorded, not yet authoritative mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: String,
    /// Id of the entity being changed (not the change id)
    pub entity_id: String,
    pub entity_type: String,
    pub application_type: String,
    pub author: String,
    pub operation: ChangeOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_entity: Option<EntitySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_entity: Option<EntitySnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl Change {
    /// Structural completeness check. Entity-specific rules belong to the caller.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(validation_error("Change id is empty"));
        }
        if self.author.trim().is_empty() {
            return Err(validation_error(format!("Change {} has no author", self.id)));
        }
        if self.entity_type.trim().is_empty() {
            return Err(validation_error(format!("Change {} has no entity type", self.id)));
        }
        if self.application_type.trim().is_empty() {
            return Err(validation_error(format!(
                "Change {} has no application type",
                self.id
            )));
        }
        if self.entity_id.trim().is_empty() {
            return Err(validation_error(format!("Change {} has no entity id", self.id)));
        }

        let require = |snapshot: &Option<EntitySnapshot>, which: &str| match snapshot {
            Some(s) if !s.is_empty() => Ok(()),
            _ => Err(validation_error(format!(
                "{} change {} requires a non-empty {} entity",
                self.operation, self.id, which
            ))),
        };
        match self.operation {
            ChangeOperation::Create => require(&self.new_entity, "new")?,
            ChangeOperation::Update => {
                require(&self.old_entity, "old")?;
                require(&self.new_entity, "new")?;
            }
            ChangeOperation::Delete => require(&self.old_entity, "old")?,
        }

        for snapshot in [&self.old_entity, &self.new_entity].into_iter().flatten() {
            if let Some(id) = snapshot.id() {
                if id != self.entity_id {
                    return Err(validation_error(format!(
                        "Change {} targets entity {} but carries a snapshot of {}",
                        self.id, self.entity_id, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Snapshot describing the entity, preferring the new state
    pub fn current_entity(&self) -> Option<&EntitySnapshot> {
        self.new_entity.as_ref().or(self.old_entity.as_ref())
    }

    /// Whether two changes would apply the same mutation to the same entity
    pub fn same_mutation(&self, other: &Change) -> bool {
        self.entity_id == other.entity_id
            && self.entity_type == other.entity_type
            && self.application_type == other.application_type
            && self.operation == other.operation
            && self.old_entity == other.old_entity
            && self.new_entity == other.new_entity
    }
}

/// A change accepted by an approving user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedChange {
    #[serde(flatten)]
    pub change: Change,
    pub approved_user: String,
    pub approval_timestamp: DateTime<Utc>,
}

impl ApprovedChange {
    pub fn new(change: Change, approved_user: impl Into<String>, approved_at: DateTime<Utc>) -> Self {
        Self {
            change,
            approved_user: approved_user.into(),
            approval_timestamp: approved_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.change.id
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.change.validate()?;
        if self.approved_user.trim().is_empty() {
            return Err(validation_error(format!(
                "Approved change {} has no approving user",
                self.change.id
            )));
        }
        Ok(())
    }
}

/// Anything that targets a single configuration entity
pub trait EntityTarget {
    fn change(&self) -> &Change;

    fn entity_id(&self) -> &str {
        &self.change().entity_id
    }
}

impl EntityTarget for Change {
    fn change(&self) -> &Change {
        self
    }
}

impl EntityTarget for ApprovedChange {
    fn change(&self) -> &Change {
        &self.change
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    pub const PROFILE: &str = "TELEMETRY_PROFILE";

    pub fn profile(id: &str, name: &str) -> EntitySnapshot {
        EntitySnapshot::new(json!({
            "id": id,
            "name": name,
            "applicationType": "stb",
            "uploadProtocol": "https",
            "uploadRepository": "https://example.com",
        }))
    }

    pub fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    pub fn change(
        id: &str,
        operation: ChangeOperation,
        old: Option<EntitySnapshot>,
        new: Option<EntitySnapshot>,
        author: &str,
    ) -> Change {
        let entity_id = old
            .as_ref()
            .or(new.as_ref())
            .and_then(|s| s.id())
            .unwrap_or_default()
            .to_string();
        Change {
            id: id.to_string(),
            entity_id,
            entity_type: PROFILE.to_string(),
            application_type: "stb".to_string(),
            author: author.to_string(),
            operation,
            old_entity: old,
            new_entity: new,
            timestamp: at(0),
        }
    }
}
