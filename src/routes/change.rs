//! Change workflow API routes
//!
//! Single-resource routes surface the specific error kind. Bulk routes always
//! answer 200 with a map of failed id -> message.

use crate::auth::{CurrentUser, Role};
use crate::change::query::APPLICATION_TYPE;
use crate::change::{
    generate_grouped_page, generate_page, ApprovedChange, Change, NewChange, SearchContext,
};
use crate::error::{validation_error, ApiResult, AppError};
use crate::models::{ApplicationTypeQuery, CancelByEntityIdsRequest, CreateChangeRequest, PageQuery};
use crate::state::SharedState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::collections::{BTreeMap, HashSet};
use validator::Validate;

/// Header carrying the total item count of a paged listing
const NUMBER_OF_ITEMS: &str = "numberOfItems";

pub fn change_routes() -> Router<SharedState> {
    Router::new()
        .route("/changes", get(list_changes).post(create_change))
        .route("/changes/filtered", post(find_changes))
        .route("/approve/{change_id}", post(approve_change))
        .route("/revert/{approve_id}", post(revert_change))
        .route("/cancel/{change_id}", post(cancel_change))
        .route("/approved", get(list_approved))
        .route("/approved/filtered", post(find_approved))
        .route("/approved/cancelByEntityIds", post(cancel_by_entity_ids))
        .route("/grouped", get(grouped_changes))
        .route("/groupedApproved", get(grouped_approved))
        .route("/entityIds", get(changed_entity_ids))
        .route("/approveEntities", post(approve_entities))
        .route("/revertEntities", post(revert_entities))
        .route("/byEntityIds", post(changes_by_entity_ids))
}

fn parse_ids(body: &Bytes, what: &str) -> ApiResult<Vec<String>> {
    serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest(format!("Unable to extract {}", what)))
}

/// Fill the application type and split off optional paging keys
fn prepare_context(
    state: &SharedState,
    query: &ApplicationTypeQuery,
    mut context: SearchContext,
) -> ApiResult<(SearchContext, Option<(usize, usize)>)> {
    let application_type = state.application_type(
        context
            .get(APPLICATION_TYPE)
            .map(String::as_str)
            .or(query.application_type.as_deref()),
    );
    context.insert(APPLICATION_TYPE.to_string(), application_type);

    let parse = |key: &str, context: &mut SearchContext| -> ApiResult<Option<usize>> {
        context
            .remove(key)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("{} is not a number: {}", key, v)))
            })
            .transpose()
    };
    let page_number = parse("pageNumber", &mut context)?;
    let page_size = parse("pageSize", &mut context)?;

    let page = match (page_number, page_size) {
        (None, None) => None,
        (Some(number), Some(size)) => Some((number, size)),
        _ => return Err(validation_error("pageNumber and pageSize must be given together")),
    };
    Ok((context, page))
}

fn paged<T: Clone + serde::Serialize>(
    items: Vec<T>,
    page: Option<(usize, usize)>,
) -> ApiResult<impl IntoResponse> {
    let total = items.len();
    let items = match page {
        Some((number, size)) => generate_page(&items, number, size)?,
        None => items,
    };
    Ok(([(NUMBER_OF_ITEMS, total.to_string())], Json(items)))
}

fn required_page(query: &PageQuery) -> ApiResult<(usize, usize)> {
    match (query.page_number, query.page_size) {
        (Some(number), Some(size)) => Ok((number, size)),
        _ => Err(AppError::BadRequest(
            "pageNumber and pageSize are required".to_string(),
        )),
    }
}

// ==================== Pending changes ====================

pub async fn list_changes(
    State(state): State<SharedState>,
    Query(query): Query<ApplicationTypeQuery>,
) -> ApiResult<Json<Vec<Change>>> {
    let mut context = SearchContext::new();
    context.insert(
        APPLICATION_TYPE.to_string(),
        state.application_type(query.application_type.as_deref()),
    );
    Ok(Json(state.changes.queries.find_by_context(&context).await?))
}

pub async fn create_change(
    State(state): State<SharedState>,
    user: CurrentUser,
    Query(query): Query<ApplicationTypeQuery>,
    Json(payload): Json<CreateChangeRequest>,
) -> ApiResult<(StatusCode, Json<Change>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    user.authorize(Role::Developer)?;

    let author = payload
        .author
        .filter(|a| !a.trim().is_empty())
        .or_else(|| user.email())
        .unwrap_or_default();

    let change = state
        .changes
        .factory
        .create_change(NewChange {
            id: payload.id,
            operation: payload.operation,
            entity_type: payload.entity_type,
            old_entity: payload.old_entity,
            new_entity: payload.new_entity,
            application_type: state.application_type(query.application_type.as_deref()),
            author,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(change)))
}

pub async fn find_changes(
    State(state): State<SharedState>,
    Query(query): Query<ApplicationTypeQuery>,
    Json(context): Json<SearchContext>,
) -> ApiResult<impl IntoResponse> {
    let (context, page) = prepare_context(&state, &query, context)?;
    let changes = state.changes.queries.find_by_context(&context).await?;
    paged(changes, page)
}

pub async fn cancel_change(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(change_id): Path<String>,
    Query(query): Query<ApplicationTypeQuery>,
) -> ApiResult<Json<Change>> {
    user.authorize(Role::Admin)?;
    let actor = state.actor(query.application_type.as_deref(), user.email());
    Ok(Json(
        state.changes.conflicts.cancel_change(&change_id, &actor).await?,
    ))
}

pub async fn grouped_changes(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let (number, size) = required_page(&query)?;
    let mut context = SearchContext::new();
    context.insert(
        APPLICATION_TYPE.to_string(),
        state.application_type(query.application_type.as_deref()),
    );

    let changes = state.changes.queries.find_by_context(&context).await?;
    let total = changes
        .iter()
        .map(|c| c.entity_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let page = generate_grouped_page(&changes, number, size)?;
    Ok(([(NUMBER_OF_ITEMS, total.to_string())], Json(page)))
}

pub async fn changed_entity_ids(
    State(state): State<SharedState>,
    Query(query): Query<ApplicationTypeQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let application_type = state.application_type(query.application_type.as_deref());
    Ok(Json(
        state
            .changes
            .conflicts
            .changed_entity_ids(&application_type)
            .await?,
    ))
}

pub async fn changes_by_entity_ids(
    State(state): State<SharedState>,
    body: Bytes,
) -> ApiResult<Json<Vec<Change>>> {
    let entity_ids = parse_ids(&body, "entityIds")?;
    Ok(Json(
        state
            .changes
            .conflicts
            .changes_by_entity_ids(&entity_ids)
            .await?,
    ))
}

// ==================== Approval and revert ====================

pub async fn approve_change(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(change_id): Path<String>,
    Query(query): Query<ApplicationTypeQuery>,
) -> ApiResult<Json<ApprovedChange>> {
    user.authorize(Role::Admin)?;
    let actor = state.actor(query.application_type.as_deref(), user.email());
    Ok(Json(
        state.changes.approvals.approve_one(&change_id, &actor).await?,
    ))
}

pub async fn revert_change(
    State(state): State<SharedState>,
    user: CurrentUser,
    Path(approve_id): Path<String>,
    Query(query): Query<ApplicationTypeQuery>,
) -> ApiResult<Json<ApprovedChange>> {
    user.authorize(Role::Admin)?;
    let actor = state.actor(query.application_type.as_deref(), user.email());
    Ok(Json(
        state.changes.reverts.revert_one(&approve_id, &actor).await?,
    ))
}

pub async fn approve_entities(
    State(state): State<SharedState>,
    user: CurrentUser,
    Query(query): Query<ApplicationTypeQuery>,
    body: Bytes,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let change_ids = parse_ids(&body, "changeIds")?;
    user.authorize(Role::Admin)?;
    let actor = state.actor(query.application_type.as_deref(), user.email());

    let outcome = state.changes.approvals.approve_many(&change_ids, &actor).await;
    Ok(Json(outcome.error_messages()))
}

pub async fn revert_entities(
    State(state): State<SharedState>,
    user: CurrentUser,
    Query(query): Query<ApplicationTypeQuery>,
    body: Bytes,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let approve_ids = parse_ids(&body, "changeIds")?;
    user.authorize(Role::Admin)?;
    let actor = state.actor(query.application_type.as_deref(), user.email());

    let outcome = state.changes.reverts.revert_many(&approve_ids, &actor).await;
    Ok(Json(outcome.error_messages()))
}

// ==================== Approved changes ====================

pub async fn list_approved(
    State(state): State<SharedState>,
    Query(query): Query<ApplicationTypeQuery>,
) -> ApiResult<Json<Vec<ApprovedChange>>> {
    let mut context = SearchContext::new();
    context.insert(
        APPLICATION_TYPE.to_string(),
        state.application_type(query.application_type.as_deref()),
    );
    Ok(Json(state.changes.queries.get_approved_all(&context).await?))
}

pub async fn find_approved(
    State(state): State<SharedState>,
    Query(query): Query<ApplicationTypeQuery>,
    Json(context): Json<SearchContext>,
) -> ApiResult<impl IntoResponse> {
    let (context, page) = prepare_context(&state, &query, context)?;
    let approved = state.changes.queries.find_approved_by_context(&context).await?;
    paged(approved, page)
}

pub async fn grouped_approved(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let (number, size) = required_page(&query)?;
    let mut context = SearchContext::new();
    context.insert(
        APPLICATION_TYPE.to_string(),
        state.application_type(query.application_type.as_deref()),
    );

    let approved = state.changes.queries.get_approved_all(&context).await?;
    let total = approved
        .iter()
        .map(|a| a.change.entity_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let page = generate_grouped_page(&approved, number, size)?;
    Ok(([(NUMBER_OF_ITEMS, total.to_string())], Json(page)))
}

pub async fn cancel_by_entity_ids(
    State(state): State<SharedState>,
    user: CurrentUser,
    Query(query): Query<ApplicationTypeQuery>,
    Json(payload): Json<CancelByEntityIdsRequest>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    user.authorize(Role::Admin)?;
    let actor = state.actor(query.application_type.as_deref(), user.email());
    let outcome = state
        .changes
        .conflicts
        .cancel_approved_changes_by_entity_id(
            &payload.entity_ids,
            &payload.exclude_ids,
            payload.entity_type.as_deref(),
            &actor,
        )
        .await?;
    Ok(Json(outcome.error_messages()))
}
