use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use core::error::AppError;
use core::player::{League, NewPlayer, PlayerCareerStore, ProgressPatch};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthUser, verify_hmac_request};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/players/create", post(create_player))
        .route("/api/players/{id}", get(get_player))
        .route("/api/players/{id}/progress", post(progress_player))
        .route("/api/players/{id}/complete", post(complete_player))
}

#[derive(Deserialize)]
struct CreatePlayerBody {
    player_id: String,
    display_name: Option<String>,
    overall_rating: Option<i32>,
    current_league: Option<String>,
}

#[derive(Serialize)]
struct PlayerResponse {
    ok: bool,
    player: core::player::Player,
}

async fn create_player(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    axum::Json(body): axum::Json<CreatePlayerBody>,
) -> ApiResult<impl IntoResponse> {
    let current_league = body
        .current_league
        .as_deref()
        .map(|s| League::parse(s).ok_or_else(|| AppError::validation("invalid current_league")))
        .transpose()?;

    let player = state
        .database
        .players()
        .create_player(NewPlayer {
            id: body.player_id,
            user_id,
            display_name: body.display_name,
            overall_rating: body.overall_rating,
            current_league,
        })
        .await?;

    Ok(axum::Json(PlayerResponse { ok: true, player }))
}

async fn get_player(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(player_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let player = state
        .database
        .players()
        .get_player(&player_id)
        .await?
        .ok_or_else(|| AppError::not_found("player not found"))?;

    if player.user_id != user_id {
        return Err(ApiError(AppError::forbidden("you do not own this player")));
    }

    Ok(axum::Json(PlayerResponse { ok: true, player }))
}

#[derive(Deserialize)]
struct ProgressBody {
    user_id: String,
    overall_rating: Option<i32>,
    current_league: Option<String>,
}

async fn progress_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> ApiResult<impl IntoResponse> {
    verify_hmac_request(state.hmac_secret.as_deref(), &headers, &raw_body)?;

    let body: ProgressBody =
        serde_json::from_slice(&raw_body).map_err(|_| ApiError(AppError::validation("invalid JSON body")))?;

    let current_league = body
        .current_league
        .as_deref()
        .map(|s| League::parse(s).ok_or_else(|| AppError::validation("invalid current_league")))
        .transpose()?;

    let patch = ProgressPatch {
        overall_rating: body.overall_rating,
        current_league,
    };

    let player = state.database.players().update_progress(&player_id, patch).await?;

    Ok(axum::Json(serde_json::json!({ "ok": true, "player": player })))
}

async fn complete_player(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(player_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let player = state
        .database
        .players()
        .get_player(&player_id)
        .await?
        .ok_or_else(|| AppError::not_found("player not found"))?;

    if player.user_id != user_id {
        return Err(ApiError(AppError::forbidden("you do not own this player")));
    }

    let outcome = state.database.players().complete_career(&player_id).await?;

    Ok(axum::Json(serde_json::json!({
        "ok": true,
        "already_completed": outcome.already_completed,
        "days_to_premier": outcome.days_to_premier,
    })))
}
