//! Agent authentication
//!
//! Agents authenticate with a bearer token: an HS256 JWT whose subject is
//! the agent id. The extractor validates the token and loads the agent row,
//! so handlers receive a live `Agent` and never re-check credentials.

use crate::error::ApiError;
use crate::state::AppState;
use agentpay_types::{Agent, AgentId, GatewayError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Agent id
    sub: String,
    /// Expiry, unix seconds
    exp: i64,
}

/// The calling agent, authenticated and loaded
#[derive(Debug, Clone)]
pub struct AuthenticatedAgent(pub Agent);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedAgent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError(GatewayError::Unauthorized))?;

        let claims = decode_token(&state.settings.token_secret, token)?;

        let agent_id = AgentId::parse(&claims.sub)
            .map_err(|_| ApiError(GatewayError::InvalidToken))?;

        let agent = state
            .db
            .agent_repo()
            .find_by_id(*agent_id.as_uuid())
            .await
            .map_err(GatewayError::from)?
            .ok_or(ApiError(GatewayError::Unauthorized))?
            .into_domain()
            .map_err(GatewayError::from)?;

        Ok(Self(agent))
    }
}

fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ApiError(GatewayError::TokenExpired)
        }
        _ => ApiError(GatewayError::InvalidToken),
    })
}

/// Mint a bearer token for an agent; used by operator tooling and tests
pub fn issue_token(
    secret: &str,
    agent_id: AgentId,
    ttl_secs: i64,
) -> Result<String, GatewayError> {
    let claims = Claims {
        sub: agent_id.to_string(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| GatewayError::internal(format!("token encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let agent_id = AgentId::new();
        let token = issue_token("test-secret", agent_id, 60).unwrap();
        let claims = decode_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, agent_id.to_string());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("secret-a", AgentId::new(), 60).unwrap();
        let err = decode_token("secret-b", &token).unwrap_err();
        assert_eq!(err.0.error_code(), "INVALID_TOKEN");
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token("test-secret", AgentId::new(), -120).unwrap();
        let err = decode_token("test-secret", &token).unwrap_err();
        assert_eq!(err.0.error_code(), "TOKEN_EXPIRED");
    }

    #[test]
    fn test_garbage_token_rejected() {
        let err = decode_token("test-secret", "not.a.jwt").unwrap_err();
        assert_eq!(err.0.error_code(), "INVALID_TOKEN");
    }
}
