use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use core::error::AppError;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Cron-bearer gate: a constant-time compare against a shared secret,
/// failing closed when unconfigured.
pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(secret) = &state.cron_secret else {
            return Err(ApiError(AppError::auth("cron authentication is not configured")));
        };

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(AppError::auth("missing authorization header")))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError(AppError::auth("expected a bearer token")))?;

        if token.as_bytes().ct_eq(secret.as_bytes()).unwrap_u8() != 1 {
            return Err(ApiError(AppError::auth("invalid cron secret")));
        }

        Ok(CronAuth)
    }
}
