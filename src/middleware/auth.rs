use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::routes::AppState;

/// Header the analysis worker uses to authenticate its calls.
pub const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user id
    pub kind: TokenKind,
    /// Unique per token, so two tokens issued in the same second still differ
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        let claims = verify_token(token, &state.jwt_secret, TokenKind::Access)?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Authorization token is required",
            AuthError::InvalidToken => "Invalid authorization token",
            AuthError::ExpiredToken => "Authorization token has expired",
        };

        // Same envelope and code as AppError::Unauthorized
        let body = Json(json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": message
            }
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Caller proved it is the analysis worker by sending the shared secret.
#[derive(Debug, Clone)]
pub struct WorkerAuth;

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(CALLBACK_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if secret_matches(provided, &state.callback_secret) {
            Ok(WorkerAuth)
        } else {
            tracing::warn!("Rejected worker call with invalid callback secret");
            Err(AppError::Forbidden("Invalid callback secret".to_string()))
        }
    }
}

fn create_token(
    user_id: &str,
    secret: &str,
    kind: TokenKind,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        kind,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn create_access_token(
    user_id: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    create_token(
        user_id,
        secret,
        TokenKind::Access,
        Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
    )
}

pub fn create_refresh_token(
    user_id: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    create_token(
        user_id,
        secret,
        TokenKind::Refresh,
        Duration::days(REFRESH_TOKEN_TTL_DAYS),
    )
}

/// Checks signature, expiry and that the token is of the expected kind,
/// so a refresh token cannot be used as a bearer token and vice versa.
pub fn verify_token(token: &str, secret: &str, kind: TokenKind) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    })?;

    if token_data.claims.kind != kind {
        return Err(AuthError::InvalidToken);
    }

    Ok(token_data.claims)
}

/// Compares digests so the check does not depend on where the strings differ.
/// An unset secret never matches.
pub fn secret_matches(provided: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
