//! Change workflow facade
//!
//! Wires the coordinators over one shared store so handlers hold a single
//! cloneable value.

use crate::change::{
    ApprovalCoordinator, BatchExecutor, ChangeFactory, ChangeStore, Clock, ConflictResolver,
    IdGenerator, QueryService, RevertCoordinator, SystemClock, UuidGenerator,
};
use crate::store::EntityStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ChangeService {
    pub factory: ChangeFactory,
    pub approvals: ApprovalCoordinator,
    pub reverts: RevertCoordinator,
    pub conflicts: ConflictResolver,
    pub queries: QueryService,
}

impl ChangeService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        default_application_type: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::with_parts(
            store,
            default_application_type,
            shutdown,
            Arc::new(UuidGenerator),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        store: Arc<dyn EntityStore>,
        default_application_type: impl Into<String>,
        shutdown: CancellationToken,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = ChangeStore::new(store);
        let batch = BatchExecutor::new(shutdown);
        let conflicts = ConflictResolver::new(store.clone(), batch.clone());

        Self {
            factory: ChangeFactory::new(store.clone(), conflicts.clone(), ids, clock.clone()),
            approvals: ApprovalCoordinator::new(store.clone(), batch.clone(), clock),
            reverts: RevertCoordinator::new(store.clone(), batch),
            queries: QueryService::new(store, default_application_type),
            conflicts,
        }
    }
}
