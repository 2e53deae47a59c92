use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use core::leaderboard::LeaderboardStore;
use core::player::PlayerCareerStore;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/leaderboard/global", get(global))
}

async fn global(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> ApiResult<impl IntoResponse> {
    let display_name = state
        .database
        .players()
        .coach_stats(&user_id)
        .await?
        .map(|s| s.display_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user_id.clone());

    let board = state.database.leaderboard().global_board(&user_id, &display_name).await?;

    Ok(axum::Json(serde_json::json!({
        "ok": true,
        "leaderboard": board.entries,
        "my_entry": board.my_entry,
        "total_coaches": board.total_coaches,
    })))
}
