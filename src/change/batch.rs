//! Batch execution with per-id isolation
//!
//! Every id in the input is attempted in order. A failure on one id is logged,
//! recorded against that id and never stops the rest of the batch. The only
//! early exit is the shutdown token, checked between ids.

use crate::error::AppError;
use std::collections::BTreeMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What happened to a single id that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Applied,
    /// Nothing to do, e.g. the id was already resolved by someone else
    Skipped,
}

/// Aggregated result of one batch call
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    failures: Vec<(String, AppError)>,
}

impl BatchOutcome {
    pub fn failures(&self) -> &[(String, AppError)] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Wire form: failed id -> human-readable message. Absent key means success.
    pub fn error_messages(&self) -> BTreeMap<String, String> {
        self.failures
            .iter()
            .map(|(id, err)| (id.clone(), err.to_string()))
            .collect()
    }
}

/// Record a per-id failure
pub fn log_and_collect_change_error(
    action: &str,
    id: &str,
    err: AppError,
    outcome: &mut BatchOutcome,
) {
    warn!("Failed to {} change {}: {}", action, id, err);
    outcome.failures.push((id.to_string(), err));
}

#[derive(Clone, Default)]
pub struct BatchExecutor {
    shutdown: CancellationToken,
}

impl BatchExecutor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    /// Run `op` for each id in input order
    pub async fn run<F, Fut>(&self, action: &str, ids: &[String], mut op: F) -> BatchOutcome
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<ItemOutcome, AppError>>,
    {
        let mut outcome = BatchOutcome::default();

        for id in ids {
            if self.shutdown.is_cancelled() {
                log_and_collect_change_error(
                    action,
                    id,
                    AppError::Cancelled("Batch interrupted by shutdown".to_string()),
                    &mut outcome,
                );
                continue;
            }

            match op(id.clone()).await {
                Ok(ItemOutcome::Applied) => outcome.applied.push(id.clone()),
                Ok(ItemOutcome::Skipped) => {
                    debug!("Skipping {} of unresolved change {}", action, id);
                    outcome.skipped.push(id.clone());
                }
                Err(err) => log_and_collect_change_error(action, id, err, &mut outcome),
            }
        }

        debug!(
            "Batch {} finished: {} applied, {} skipped, {} failed",
            action,
            outcome.applied.len(),
            outcome.skipped.len(),
            outcome.failures.len()
        );
        outcome
    }
}
