use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use core::sweep;
use serde::Deserialize;

use crate::auth::CronAuth;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sweep/status", get(status))
        .route("/api/sweep/run", post(run))
}

async fn status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let status = state.database.sweep().status().await?;
    Ok(axum::Json(serde_json::json!({
        "ok": true,
        "last_sweep_utc_day": status.last_sweep_utc_day,
        "last_sweep_at": status.last_sweep_at,
        "run_count": status.run_count,
    })))
}

#[derive(Deserialize, Default)]
struct RunBody {
    #[serde(default)]
    force: bool,
}

async fn run(
    State(state): State<AppState>,
    _cron: CronAuth,
    body: Option<axum::Json<RunBody>>,
) -> ApiResult<impl IntoResponse> {
    let force = body.map(|b| b.0.force).unwrap_or(false);
    let store = state.database.sweep();
    let summary = sweep::execute(&store, force, chrono::Utc::now()).await?;
    let ok = summary.errors.is_empty();
    Ok(axum::Json(serde_json::json!({
        "ok": ok,
        "ran": summary.ran,
        "reason": summary.reason,
        "utc_day": summary.utc_day,
        "total_active_players": summary.total_active_players,
        "promotions": summary.promotions,
        "promotions_truncated": summary.promotions_truncated,
        "completions": summary.completions,
        "skipped": summary.skipped,
        "skipped_truncated": summary.skipped_truncated,
        "errors": summary.errors,
    })))
}
