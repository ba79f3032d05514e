//! Request and query DTOs for the change API

use crate::change::{ChangeOperation, EntitySnapshot};
use serde::Deserialize;
use validator::Validate;

/// `?applicationType=` accepted by every change route
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationTypeQuery {
    pub application_type: Option<String>,
}

/// Paging parameters for grouped listings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub application_type: Option<String>,
    pub page_number: Option<usize>,
    pub page_size: Option<usize>,
}

/// Proposed change as posted by an admin client
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChangeRequest {
    pub id: Option<String>,
    pub operation: ChangeOperation,
    #[validate(length(min = 1, message = "Entity type is required"))]
    pub entity_type: String,
    pub old_entity: Option<EntitySnapshot>,
    pub new_entity: Option<EntitySnapshot>,
    /// Defaults to the authenticated user's email
    pub author: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelByEntityIdsRequest {
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    /// Limit the cancel to one entity type
    pub entity_type: Option<String>,
}
