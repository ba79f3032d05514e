//! Change approval workflow
//!
//! Pending changes are proposed mutations of configuration entities. An
//! approving user promotes them to approved changes, which applies the
//! mutation; reverting applies the inverse. Bulk variants isolate failures
//! per id and report them as an id -> message map.

pub mod approval;
pub mod batch;
pub mod conflict;
pub mod context;
pub mod factory;
pub mod models;
pub mod query;
pub mod revert;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use approval::ApprovalCoordinator;
pub use batch::{log_and_collect_change_error, BatchExecutor, BatchOutcome, ItemOutcome};
pub use conflict::{entity_ids_of, group_by_entity, ConflictResolver};
pub use context::Actor;
pub use factory::{ChangeFactory, Clock, IdGenerator, NewChange, SystemClock, UuidGenerator};
pub use models::{ApprovedChange, Change, ChangeOperation, EntitySnapshot, EntityTarget};
pub use query::{generate_grouped_page, generate_page, QueryService, SearchContext};
pub use revert::RevertCoordinator;
pub use service::ChangeService;
pub use store::ChangeStore;
