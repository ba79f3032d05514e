//! JWT token management

use crate::auth::Role;
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access token lifetime
const TOKEN_EXPIRATION_MINUTES: i64 = 60;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// User email, recorded as author or approving user
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Issue a signed access token
pub fn create_token(user_id: Uuid, email: &str, role: Role, secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (now + Duration::minutes(TOKEN_EXPIRATION_MINUTES)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create access token: {}", e)))
}

/// Decode and validate a JWT token
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidToken => {
            AppError::Unauthorized("Invalid token".to_string())
        }
        _ => AppError::Unauthorized(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let user = Uuid::new_v4();
        let token = create_token(user, "admin@example.com", Role::Admin, SECRET).unwrap();

        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = create_token(Uuid::new_v4(), "a@example.com", Role::Viewer, SECRET).unwrap();
        assert!(matches!(
            decode_token(&token, "other-secret"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            decode_token("garbage", SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }
}
