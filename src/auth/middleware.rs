//! Authentication middleware
//!
//! Bearer tokens are optional for read-only routes. A request without one
//! proceeds anonymously and fails any role check above viewer; a request with
//! a bad one is rejected.

use crate::auth::{decode_token, Claims, Role};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

/// Decode the bearer token, if any, into request extensions
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(auth_header) = request.headers().get(AUTHORIZATION) else {
        return Ok(next.run(request).await);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;

    let claims = decode_token(token, &state.jwt_secret)?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Require specific role
pub fn require_role(claims: &Claims, required: Role) -> Result<(), AppError> {
    let has_permission = match required {
        Role::Viewer => true,
        Role::Developer => claims.role.can_propose(),
        Role::Admin => claims.role.can_approve(),
    };

    if !has_permission {
        return Err(AppError::Forbidden(format!(
            "Requires {} role, you have {}",
            required, claims.role
        )));
    }

    Ok(())
}

/// Claims of the authenticated caller, if the request carried a token
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<Claims>);

impl CurrentUser {
    pub fn email(&self) -> Option<String> {
        self.0.as_ref().map(|c| c.email.clone())
    }

    /// Role check for the caller. Anonymous callers only get `Viewer` access.
    pub fn authorize(&self, required: Role) -> Result<(), AppError> {
        match (&self.0, required) {
            (Some(claims), _) => require_role(claims, required),
            (None, Role::Viewer) => Ok(()),
            (None, _) => Err(AppError::Unauthorized(format!(
                "Missing authorization header, {} role required",
                required
            ))),
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(parts.extensions.get::<Claims>().cloned()))
    }
}
