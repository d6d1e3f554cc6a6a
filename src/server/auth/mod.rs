//! Agent-surface authentication.
//!
//! Bearer tokens are minted by the identity service; this module only
//! validates them and hands the agent's claims to handlers. The claim
//! subject is the agent's voip user id.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Agent (voip user) id.
    pub sub: Uuid,
    pub name: String,
    pub role: String,
    /// Expiration timestamp.
    pub exp: usize,
}

#[derive(Debug, Serialize)]
pub struct AuthError {
    pub message: String,
}

/// Validate a JWT token and extract claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// JWT Auth extractor - extracts Claims from Authorization header
impl FromRequestParts<Arc<AppState>> for Claims {
    type Rejection = (StatusCode, Json<AuthError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(AuthError {
                        message: "Missing authorization header".to_string(),
                    }),
                )
            })?;

        let claims = validate_token(bearer.token(), &state.config.jwt_secret).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    message: "Invalid token".to_string(),
                }),
            )
        })?;

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            name: "Agent X".to_string(),
            role: "agent".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        }
    }

    #[test]
    fn round_trips_a_valid_token() {
        let claims = valid_claims();
        let token = token_for(&claims, "secret");
        let decoded = validate_token(&token, "secret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role, "agent");
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let token = token_for(&valid_claims(), "secret");
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn rejects_an_expired_token() {
        let mut claims = valid_claims();
        claims.exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        let token = token_for(&claims, "secret");
        assert!(validate_token(&token, "secret").is_err());
    }
}
