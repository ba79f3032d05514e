//! Context-filtered change queries and pagination

use crate::change::conflict::group_by_entity;
use crate::change::{ApprovedChange, Change, ChangeStore, EntityTarget};
use crate::error::{validation_error, AppError};
use std::collections::{BTreeMap, HashMap};

/// Free-form filter supplied by the admin layer
pub type SearchContext = HashMap<String, String>;

pub const APPLICATION_TYPE: &str = "applicationType";
pub const AUTHOR: &str = "author";
pub const ENTITY: &str = "entity";
pub const PROFILE_NAME: &str = "profileName";
pub const ENTITY_TYPE: &str = "entityType";
pub const ENTITY_ID: &str = "entityId";
pub const APPROVED_USER: &str = "approvedUser";

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn context_value<'a>(context: &'a SearchContext, key: &str) -> Option<&'a str> {
    context
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Whether a change satisfies every non-scope key of the context
fn matches_context(change: &Change, context: &SearchContext) -> bool {
    if let Some(author) = context_value(context, AUTHOR) {
        if !contains_ignore_case(&change.author, author) {
            return false;
        }
    }

    let name_filter =
        context_value(context, ENTITY).or_else(|| context_value(context, PROFILE_NAME));
    if let Some(name) = name_filter {
        let entity_name = change.current_entity().and_then(|s| s.name()).unwrap_or_default();
        if !contains_ignore_case(entity_name, name) {
            return false;
        }
    }

    if let Some(entity_type) = context_value(context, ENTITY_TYPE) {
        if change.entity_type != entity_type {
            return false;
        }
    }

    if let Some(entity_id) = context_value(context, ENTITY_ID) {
        if change.entity_id != entity_id {
            return false;
        }
    }

    true
}

fn newest_first<T: EntityTarget>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.change()
            .timestamp
            .cmp(&a.change().timestamp)
            .then_with(|| a.change().id.cmp(&b.change().id))
    });
}

/// Slice one 1-based page out of `items`. A page past the end is empty.
pub fn generate_page<T: Clone>(
    items: &[T],
    page_number: usize,
    page_size: usize,
) -> Result<Vec<T>, AppError> {
    if page_number == 0 || page_size == 0 {
        return Err(validation_error(
            "pageNumber and pageSize should both be greater than zero",
        ));
    }
    let start = (page_number - 1).saturating_mul(page_size);
    Ok(items.iter().skip(start).take(page_size).cloned().collect())
}

/// Page over entity groups rather than over individual changes
pub fn generate_grouped_page<T: EntityTarget + Clone>(
    items: &[T],
    page_number: usize,
    page_size: usize,
) -> Result<BTreeMap<String, Vec<T>>, AppError> {
    let groups: Vec<(String, Vec<T>)> = group_by_entity(items).into_iter().collect();
    Ok(generate_page(&groups, page_number, page_size)?
        .into_iter()
        .collect())
}

#[derive(Clone)]
pub struct QueryService {
    store: ChangeStore,
    default_application_type: String,
}

impl QueryService {
    pub fn new(store: ChangeStore, default_application_type: impl Into<String>) -> Self {
        Self {
            store,
            default_application_type: default_application_type.into(),
        }
    }

    fn application_type<'a>(&'a self, context: &'a SearchContext) -> &'a str {
        context_value(context, APPLICATION_TYPE).unwrap_or(self.default_application_type.as_str())
    }

    /// Pending changes in the context's application type, newest first
    pub async fn find_by_context(&self, context: &SearchContext) -> Result<Vec<Change>, AppError> {
        let mut changes: Vec<Change> = self
            .store
            .list_changes_for(self.application_type(context))
            .await?
            .into_iter()
            .filter(|c| matches_context(c, context))
            .collect();
        newest_first(&mut changes);
        Ok(changes)
    }

    pub async fn find_approved_by_context(
        &self,
        context: &SearchContext,
    ) -> Result<Vec<ApprovedChange>, AppError> {
        let approved_user = context_value(context, APPROVED_USER);
        let mut approved: Vec<ApprovedChange> = self
            .store
            .list_approved_for(self.application_type(context))
            .await?
            .into_iter()
            .filter(|a| matches_context(&a.change, context))
            .filter(|a| approved_user.map_or(true, |u| contains_ignore_case(&a.approved_user, u)))
            .collect();
        newest_first(&mut approved);
        Ok(approved)
    }

    /// Every approved change of the context's application type
    pub async fn get_approved_all(
        &self,
        context: &SearchContext,
    ) -> Result<Vec<ApprovedChange>, AppError> {
        let mut approved = self
            .store
            .list_approved_for(self.application_type(context))
            .await?;
        newest_first(&mut approved);
        Ok(approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::models::fixtures::*;
    use crate::change::testing::{admin, harness, seed};
    use crate::change::ChangeOperation;
    use pretty_assertions::assert_eq;

    fn context(pairs: &[(&str, &str)]) -> SearchContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ids<T: EntityTarget>(items: &[T]) -> Vec<&str> {
        items.iter().map(|c| c.change().id.as_str()).collect()
    }

    #[test]
    fn test_generate_page() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(generate_page(&items, 1, 2).unwrap(), vec![1, 2]);
        assert_eq!(generate_page(&items, 3, 2).unwrap(), vec![5]);
        assert!(generate_page(&items, 4, 2).unwrap().is_empty());
        assert!(matches!(generate_page(&items, 0, 2), Err(AppError::Validation(_))));
        assert!(matches!(generate_page(&items, 1, 0), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_grouped_page_counts_entities() {
        let changes = vec![
            change("c1", ChangeOperation::Create, None, Some(profile("p1", "a")), "x"),
            change("c2", ChangeOperation::Delete, Some(profile("p1", "a")), None, "x"),
            change("c3", ChangeOperation::Create, None, Some(profile("p2", "b")), "x"),
        ];
        let page = generate_grouped_page(&changes, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page["p1"].len(), 2);

        let page = generate_grouped_page(&changes, 2, 1).unwrap();
        assert_eq!(page.keys().collect::<Vec<_>>(), vec!["p2"]);
    }

    #[tokio::test]
    async fn test_empty_context_is_scoped_to_default_application_type() {
        let h = harness();
        let mut other = change("c2", ChangeOperation::Create, None, Some(profile("p2", "b")), "x");
        other.application_type = "rdkcloud".to_string();
        seed(&h, change("c1", ChangeOperation::Create, None, Some(profile("p1", "a")), "x")).await;
        seed(&h, other).await;

        let found = h.service.queries.find_by_context(&SearchContext::new()).await.unwrap();
        assert_eq!(ids(&found), vec!["c1"]);

        let found = h
            .service
            .queries
            .find_by_context(&context(&[(APPLICATION_TYPE, "rdkcloud")]))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["c2"]);

        let found = h
            .service
            .queries
            .find_by_context(&context(&[(APPLICATION_TYPE, "xhome")]))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_context_filters_and_ordering() {
        let h = harness();
        let mut older = change("a", ChangeOperation::Create, None, Some(profile("p1", "Morning")), "Alice");
        older.timestamp = at(10);
        let mut newer = change("b", ChangeOperation::Create, None, Some(profile("p2", "Evening")), "bob");
        newer.timestamp = at(20);
        let mut tie = change("c", ChangeOperation::Create, None, Some(profile("p3", "morning run")), "alice");
        tie.timestamp = at(20);
        for c in [older, newer, tie] {
            seed(&h, c).await;
        }

        let all = h.service.queries.find_by_context(&SearchContext::new()).await.unwrap();
        assert_eq!(ids(&all), vec!["b", "c", "a"]);

        let by_author = h
            .service
            .queries
            .find_by_context(&context(&[(AUTHOR, "ALICE")]))
            .await
            .unwrap();
        assert_eq!(ids(&by_author), vec!["c", "a"]);

        let by_name = h
            .service
            .queries
            .find_by_context(&context(&[(PROFILE_NAME, "morn")]))
            .await
            .unwrap();
        assert_eq!(ids(&by_name), vec!["c", "a"]);

        let by_entity = h
            .service
            .queries
            .find_by_context(&context(&[(ENTITY_ID, "p2"), (ENTITY_TYPE, PROFILE)]))
            .await
            .unwrap();
        assert_eq!(ids(&by_entity), vec!["b"]);
    }

    #[tokio::test]
    async fn test_approved_queries() {
        let h = harness();
        seed(&h, change("c1", ChangeOperation::Create, None, Some(profile("p1", "a")), "x")).await;
        seed(&h, change("c2", ChangeOperation::Create, None, Some(profile("p2", "b")), "x")).await;
        h.service.approvals.approve_one("c1", &admin()).await.unwrap();
        h.service.approvals.approve_one("c2", &admin()).await.unwrap();

        let all = h
            .service
            .queries
            .get_approved_all(&SearchContext::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let by_user = h
            .service
            .queries
            .find_approved_by_context(&context(&[(APPROVED_USER, "ADMIN@")]))
            .await
            .unwrap();
        assert_eq!(by_user.len(), 2);

        let none = h
            .service
            .queries
            .find_approved_by_context(&context(&[(APPROVED_USER, "someone-else")]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
