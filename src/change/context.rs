//! Caller context for workflow operations

use crate::change::Change;
use crate::error::{conflict_error, validation_error, AppError};

/// Who is acting, and under which application type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub application_type: String,
    /// Authenticated user, if any
    pub user: Option<String>,
}

impl Actor {
    pub fn new(application_type: impl Into<String>, user: Option<String>) -> Self {
        Self {
            application_type: application_type.into(),
            user: user.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn anonymous(application_type: impl Into<String>) -> Self {
        Self::new(application_type, None)
    }

    /// The approving user; approval without one is a validation failure
    pub fn approver(&self) -> Result<&str, AppError> {
        self.user
            .as_deref()
            .ok_or_else(|| validation_error("Approving user is required to approve a change"))
    }

    /// Reject records stored under a different application type
    pub fn check_scope(&self, change: &Change) -> Result<(), AppError> {
        if change.application_type != self.application_type {
            return Err(conflict_error(format!(
                "Change {} belongs to application type {}, request is for {}",
                change.id, change.application_type, self.application_type
            )));
        }
        Ok(())
    }
}
