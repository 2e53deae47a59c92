use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use core::error::AppError;
use serde::Serialize;

/// Maps the core's tagged error kind onto an HTTP status.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Auth(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Conflict(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Infra(m) => {
                log::error!("infrastructure error: {m}");
                (StatusCode::SERVICE_UNAVAILABLE, "service temporarily unavailable".to_string())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
