use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let storage_ok = state.database.health_check().await;

    axum::Json(serde_json::json!({
        "ok": true,
        "service": "brain",
        "version": env!("CARGO_PKG_VERSION"),
        "modules": [
            "players", "sweep", "seasons", "leagues", "squads", "groups", "leaderboard",
        ],
        "auth": {
            "jwt": state.jwt_secret.is_some(),
            "hmac": state.hmac_secret.is_some(),
            "cron": state.cron_secret.is_some(),
        },
        "storage": if storage_ok { "ok" } else { "unavailable" },
    }))
}
