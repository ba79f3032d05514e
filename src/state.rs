//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::change::{Actor, ChangeService};
use crate::config::Settings;
use crate::store::EntityStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application state shared across all handlers
pub struct AppState {
    /// Change workflow over the configured entity store
    pub changes: ChangeService,

    /// Application type used when a request names none
    pub default_application_type: String,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Cancelled on graceful shutdown; stops running batches between ids
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, settings: &Settings, shutdown: CancellationToken) -> Self {
        let default_application_type = settings.change.default_application_type.clone();
        Self {
            changes: ChangeService::new(store, default_application_type.clone(), shutdown.clone()),
            default_application_type,
            jwt_secret: settings.auth.jwt_secret.clone(),
            shutdown,
        }
    }

    /// Resolve the request's application type, falling back to the default
    pub fn application_type(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_application_type.as_str())
            .to_string()
    }

    pub fn actor(&self, requested: Option<&str>, user: Option<String>) -> Actor {
        Actor::new(self.application_type(requested), user)
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
