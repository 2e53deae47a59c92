use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use core::error::AppError;
use core::squad::{FacilityType, JoinOutcome, MemberRole, NewSquad, SquadPrivacy, SquadStore};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/squads/leaderboard", get(leaderboard))
        .route("/api/squads/search", get(search))
        .route("/api/squads/create", post(create))
        .route("/api/squads/{id}/join", post(join))
        .route("/api/squads/{id}/request-join", post(request_join))
        .route("/api/squads/{id}/upgrade", post(upgrade))
        .route("/api/squads/{id}/set-role", post(set_role))
        .route("/api/squads/requests/{id}/resolve", post(resolve_request))
        .route("/api/squads/leave", post(leave))
        .route("/api/squads/mine", get(mine))
        .route("/api/squads/{id}/profile", get(profile))
        .route("/api/squads/{id}/requests", get(pending_requests))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

const DEFAULT_LIMIT: i64 = 50;

async fn leaderboard(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> ApiResult<impl IntoResponse> {
    let squads = state.database.squads().leaderboard(q.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "squads": squads })))
}

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
    limit: Option<i64>,
}

async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> ApiResult<impl IntoResponse> {
    let squads = state
        .database
        .squads()
        .search(q.query.as_deref().unwrap_or(""), q.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "squads": squads })))
}

#[derive(Deserialize)]
struct CreateBody {
    name: String,
    tag: Option<String>,
    description: Option<String>,
    privacy: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    axum::Json(body): axum::Json<CreateBody>,
) -> ApiResult<impl IntoResponse> {
    let privacy = body
        .privacy
        .as_deref()
        .map(|s| SquadPrivacy::parse(s).ok_or_else(|| AppError::validation("invalid privacy")))
        .transpose()?
        .unwrap_or(SquadPrivacy::Open);

    let squad = state
        .database
        .squads()
        .create_squad(
            &user_id,
            NewSquad {
                name: body.name,
                tag: body.tag,
                description: body.description,
                privacy,
            },
        )
        .await?;

    Ok(axum::Json(serde_json::json!({ "ok": true, "squad": squad })))
}

fn parse_squad_id(id: &str) -> ApiResult<uuid::Uuid> {
    uuid::Uuid::parse_str(id).map_err(|_| ApiError(AppError::validation("invalid squad id")))
}

async fn join(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let squad_id = parse_squad_id(&id)?;
    state.database.squads().join_open_squad(&user_id, squad_id).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true })))
}

async fn request_join(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let squad_id = parse_squad_id(&id)?;
    let (outcome, request) = state.database.squads().request_join(&user_id, squad_id).await?;
    Ok(axum::Json(serde_json::json!({
        "ok": true,
        "joined": outcome == JoinOutcome::Joined,
        "request": request,
    })))
}

#[derive(Deserialize)]
struct UpgradeBody {
    facility_type: String,
}

async fn upgrade(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<UpgradeBody>,
) -> ApiResult<impl IntoResponse> {
    let squad_id = parse_squad_id(&id)?;
    let facility = FacilityType::parse(&body.facility_type)
        .ok_or_else(|| ApiError(AppError::validation("invalid facility_type")))?;

    let squad = state.database.squads().upgrade_facility(&user_id, squad_id, facility).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "squad": squad })))
}

#[derive(Deserialize)]
struct SetRoleBody {
    user_id: String,
    role: String,
}

async fn set_role(
    State(state): State<AppState>,
    AuthUser(leader_user_id): AuthUser,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<SetRoleBody>,
) -> ApiResult<impl IntoResponse> {
    let squad_id = parse_squad_id(&id)?;
    let role = MemberRole::parse(&body.role)
        .filter(MemberRole::is_assignable)
        .ok_or_else(|| ApiError(AppError::validation("role must be co_leader or member")))?;

    state
        .database
        .squads()
        .set_member_role(&leader_user_id, squad_id, &body.user_id, role)
        .await?;
    Ok(axum::Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
struct ResolveBody {
    action: String,
}

async fn resolve_request(
    State(state): State<AppState>,
    AuthUser(resolver_user_id): AuthUser,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<ResolveBody>,
) -> ApiResult<impl IntoResponse> {
    let request_id = uuid::Uuid::parse_str(&id).map_err(|_| ApiError(AppError::validation("invalid request id")))?;
    let approve = match body.action.as_str() {
        "approve" => true,
        "reject" => false,
        _ => return Err(ApiError(AppError::validation("action must be approve or reject"))),
    };

    let request = state
        .database
        .squads()
        .resolve_join_request(request_id, &resolver_user_id, approve)
        .await?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "request": request })))
}

async fn leave(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> ApiResult<impl IntoResponse> {
    state.database.squads().leave_squad(&user_id).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true })))
}

async fn mine(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> ApiResult<impl IntoResponse> {
    let result = state.database.squads().my_squad(&user_id).await?;
    match result {
        Some((squad, member)) => Ok(axum::Json(serde_json::json!({ "ok": true, "squad": squad, "member": member }))),
        None => Ok(axum::Json(serde_json::json!({ "ok": true, "squad": null, "member": null }))),
    }
}

async fn profile(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let squad_id = parse_squad_id(&id)?;
    let squad = state
        .database
        .squads()
        .get_squad(squad_id)
        .await?
        .ok_or_else(|| AppError::not_found("squad not found"))?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "squad": squad })))
}

async fn pending_requests(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let squad_id = parse_squad_id(&id)?;

    let mine = state.database.squads().my_squad(&user_id).await?;
    let can_manage = mine
        .as_ref()
        .is_some_and(|(squad, member)| squad.id == squad_id && member.role.can_manage());
    if !can_manage {
        return Err(ApiError(AppError::forbidden("only the leader or co-leader may view requests")));
    }

    let requests = state.database.squads().pending_requests(squad_id).await?;
    Ok(axum::Json(serde_json::json!({ "ok": true, "requests": requests })))
}
