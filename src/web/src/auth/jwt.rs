use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use core::error::AppError;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

const DEV_USER_HEADER: &str = "x-dev-user-id";

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// The authenticated coach's user id, derived server-side from a
/// verified JWT — never from a caller-supplied field.
pub struct AuthUser(pub String);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !state.is_production {
            if let Some(dev_user) = parts.headers.get(DEV_USER_HEADER).and_then(|v| v.to_str().ok()) {
                if !dev_user.is_empty() {
                    return Ok(AuthUser(dev_user.to_string()));
                }
            }
        }

        let Some(secret) = &state.jwt_secret else {
            return Err(ApiError(AppError::auth("authentication is not configured")));
        };

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(AppError::auth("missing authorization header")))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError(AppError::auth("expected a bearer token")))?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError(AppError::auth("invalid or expired token")))?;

        let user_id = data
            .claims
            .sub
            .or(data.claims.user_id)
            .ok_or_else(|| ApiError(AppError::auth("token is missing a user id claim")))?;

        Ok(AuthUser(user_id))
    }
}
