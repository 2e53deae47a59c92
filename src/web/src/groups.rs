use axum::Router;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use core::error::AppError;
use core::group::{GroupStore, MAX_INVITE_CODE_ATTEMPTS, generate_invite_code};
use core::leaderboard::{CoachRankable, rank_coaches};
use core::player::PlayerCareerStore;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/groups/create", post(create))
        .route("/api/groups/join", post(join))
        .route("/api/groups/mine", get(mine))
        .route("/api/groups/{id}/leaderboard", get(group_leaderboard))
        .route("/api/groups/{id}/leave", post(leave))
}

#[derive(Deserialize)]
struct CreateBody {
    name: String,
}

/// Retries a fresh candidate code up to five times on collision.
async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    axum::Json(body): axum::Json<CreateBody>,
) -> ApiResult<impl IntoResponse> {
    let store = state.database.groups();
    let mut rng = rand::rng();

    for _ in 0..MAX_INVITE_CODE_ATTEMPTS {
        let candidate = generate_invite_code(&mut rng);
        if let Some(group) = store.try_create_group(&user_id, &body.name, &candidate).await? {
            return Ok(axum::Json(serde_json::json!({ "ok": true, "group": group })));
        }
    }

    Err(ApiError(AppError::infra("could not allocate a unique invite code")))
}

#[derive(Deserialize)]
struct JoinBody {
    invite_code: String,
}

async fn join(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    axum::Json(body): axum::Json<JoinBody>,
) -> ApiResult<impl IntoResponse> {
    let (group, outcome) = state.database.groups().join_by_code(&user_id, &body.invite_code).await?;
    Ok(axum::Json(serde_json::json!({
        "ok": true,
        "group": group,
        "already_member": outcome.already_member,
    })))
}

async fn mine(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> ApiResult<impl IntoResponse> {
    let groups = state.database.groups().my_groups(&user_id).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "groups": groups })))
}

fn parse_group_id(id: &str) -> ApiResult<uuid::Uuid> {
    uuid::Uuid::parse_str(id).map_err(|_| ApiError(AppError::validation("invalid group id")))
}

async fn group_leaderboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let group_id = parse_group_id(&id)?;
    let group_store = state.database.groups();

    if !group_store.is_member(group_id, &user_id).await? {
        return Err(ApiError(AppError::forbidden("you are not a member of this group")));
    }

    let members = group_store.members(group_id).await?;
    let player_store = state.database.players();

    let mut rankable = Vec::with_capacity(members.len());
    for member in &members {
        let stats = player_store.coach_stats(&member.user_id).await?;
        rankable.push(match stats {
            Some(s) => CoachRankable {
                user_id: s.user_id,
                display_name: s.display_name,
                completions_count: s.completions_count,
                best_days_to_premier: s.best_days_to_premier,
                avg_days_to_premier: s.avg_days_to_premier,
            },
            None => CoachRankable {
                user_id: member.user_id.clone(),
                display_name: member.user_id.clone(),
                completions_count: 0,
                best_days_to_premier: None,
                avg_days_to_premier: None,
            },
        });
    }

    let ranked = rank_coaches(rankable);
    let entries: Vec<_> = ranked
        .into_iter()
        .map(|(rank, coach)| serde_json::json!({ "rank": rank, "coach": coach }))
        .collect();

    Ok(axum::Json(serde_json::json!({ "ok": true, "leaderboard": entries })))
}

async fn leave(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let group_id = parse_group_id(&id)?;
    state.database.groups().leave(group_id, &user_id).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true })))
}
