//! Authentication and authorization module
//!
//! Bearer JWTs identify the acting user. Approval, revert and cancel need the
//! admin role; proposing a change needs developer or above.

mod jwt;
mod middleware;

pub use jwt::{create_token, decode_token, Claims};
pub use middleware::{auth_middleware, require_role, CurrentUser};

use serde::{Deserialize, Serialize};

/// User roles for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can list changes but not propose them
    #[default]
    Viewer,
    /// Can propose changes but not approve
    Developer,
    /// Can approve, revert and cancel changes
    Admin,
}

impl Role {
    pub fn can_propose(&self) -> bool {
        matches!(self, Role::Developer | Role::Admin)
    }

    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::Developer => write!(f, "developer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}
