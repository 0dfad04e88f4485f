use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::Role,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the HS256 tokens this service issues and accepts. The role is carried
/// for clients; the server always re-reads the current role from the user row.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: i64,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// AuthUser
///
/// The subject of a request: the decoded `(id, role)` pair. Nothing downstream of the
/// extractor ever inspects a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

/// issue_token
///
/// Signs a token for `subject_id` valid for `config.jwt_ttl_secs`.
pub fn issue_token(config: &AppConfig, subject_id: i64, role: Role) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: subject_id,
        role,
        iat: now as usize,
        exp: (now + config.jwt_ttl_secs) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {}", e)))
}

/// Decodes and validates a bearer token (signature and expiry).
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!("rejected token: {:?}", other),
            }
            AppError::Unauthorized
        })
}

fn has_credentials(parts: &Parts, config: &AppConfig) -> bool {
    parts.headers.contains_key(header::AUTHORIZATION)
        || (config.env == Env::Local && parts.headers.contains_key("x-user-id"))
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user
///    authenticates directly.
/// 2. Otherwise an `Authorization: Bearer <jwt>` header is required and validated.
/// 3. The user row is loaded so a deleted user or a changed role takes effect
///    immediately.
///
/// Rejection: `AppError::Unauthorized` (401), or a storage error if the lookup fails.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.parse::<i64>().ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = decode_token(&config, token)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// Anonymous-or-subject access for public routes: no credentials at all is `None`,
/// credentials that fail validation are still a 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        if !has_credentials(parts, &config) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

/// require_moderator
///
/// Route layer for the moderation surface: authenticates, then demands a moderator
/// or admin role.
pub async fn require_moderator(
    user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !user.role.is_moderator() {
        tracing::warn!(user_id = user.id, "moderator route refused");
        return Err(AppError::forbidden("moderator role required"));
    }
    Ok(next.run(request).await)
}
