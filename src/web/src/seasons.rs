use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use core::error::AppError;
use core::season::table::{StandingsRow, sort_standings};
use core::season::{EflTier, SeasonStore};
use serde::{Deserialize, Serialize};

use crate::auth::CronAuth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/seasons/reset-sync", post(reset_sync))
        .route("/api/seasons/simulate-day", post(simulate_day))
        .route("/api/seasons/status", get(status))
        .route("/api/leagues", get(list_leagues))
        .route("/api/leagues/{league_id}/table", get(table))
        .route("/api/leagues/{league_id}/fixtures", get(fixtures))
        .route("/api/leagues/{league_id}/results", get(results))
}

fn parse_tier(league_id: &str) -> ApiResult<EflTier> {
    EflTier::parse(league_id).ok_or_else(|| ApiError(AppError::validation("unknown league id")))
}

/// Ensures every tier has an active season, without simulating anything.
/// Idempotent: a tier that already has an active season is left alone.
/// Reads "reset-sync" as an operator-triggered consistency check rather
/// than a data-destroying reset; see DESIGN.md.
async fn reset_sync(State(state): State<AppState>, _cron: CronAuth) -> ApiResult<impl IntoResponse> {
    let store = state.database.seasons();
    let mut created = Vec::new();
    for tier in EflTier::ALL {
        let (_season, was_created) = store.get_or_create_active_season(tier).await?;
        if was_created {
            created.push(tier);
        }
    }
    Ok(axum::Json(serde_json::json!({ "ok": true, "created": created })))
}

async fn simulate_day(State(state): State<AppState>, _cron: CronAuth) -> ApiResult<impl IntoResponse> {
    let store = state.database.seasons();
    let mut rng = rand::rng();
    let results = core::season::simulate::simulate_all_tiers(&store, &mut rng).await;
    let all_ok = core::season::simulate::all_ok(&results);
    let status = if all_ok {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::MULTI_STATUS
    };
    Ok((status, axum::Json(serde_json::json!({ "ok": all_ok, "tiers": results }))))
}

#[derive(Serialize)]
struct SeasonStatusEntry {
    efl_tier: EflTier,
    current_matchday: i32,
    total_matchdays: i32,
    status: core::season::SeasonStatus,
}

async fn status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let store = state.database.seasons();
    let mut tiers = Vec::with_capacity(3);
    for tier in EflTier::ALL {
        let (season, _created) = store.get_or_create_active_season(tier).await?;
        tiers.push(SeasonStatusEntry {
            efl_tier: season.efl_tier,
            current_matchday: season.current_matchday,
            total_matchdays: season.total_matchdays,
            status: season.status,
        });
    }
    Ok(axum::Json(serde_json::json!({ "ok": true, "seasons": tiers })))
}

async fn list_leagues() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "ok": true,
        "leagues": EflTier::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
    }))
}

async fn table(State(state): State<AppState>, Path(league_id): Path<String>) -> ApiResult<impl IntoResponse> {
    let tier = parse_tier(&league_id)?;
    let store = state.database.seasons();
    let (season, _created) = store.get_or_create_active_season(tier).await?;
    let stats = store.standings(season.id).await?;

    let mut rows = Vec::with_capacity(stats.len());
    for s in stats {
        let name = store.club_name(s.club_id).await?;
        rows.push(StandingsRow { club_id: s.club_id, name, stats: s });
    }
    sort_standings(&mut rows);

    let table: Vec<_> = rows
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "club_id": r.club_id,
                "name": r.name,
                "played": r.stats.played,
                "won": r.stats.won,
                "drawn": r.stats.drawn,
                "lost": r.stats.lost,
                "goals_for": r.stats.goals_for,
                "goals_against": r.stats.goals_against,
                "goal_difference": r.stats.goal_difference(),
                "points": r.stats.points(),
            })
        })
        .collect();

    Ok(axum::Json(serde_json::json!({ "ok": true, "efl_tier": tier, "table": table })))
}

#[derive(Deserialize)]
struct MatchdayQuery {
    matchday: Option<i32>,
}

async fn fixtures_for(
    state: &AppState,
    league_id: &str,
    matchday: Option<i32>,
) -> ApiResult<Vec<core::season::Fixture>> {
    let tier = parse_tier(league_id)?;
    let store = state.database.seasons();
    let (season, _created) = store.get_or_create_active_season(tier).await?;
    let matchday = matchday.unwrap_or(season.current_matchday);
    Ok(store.fixtures_for_matchday(season.id, matchday).await?)
}

async fn fixtures(
    State(state): State<AppState>,
    Path(league_id): Path<String>,
    Query(q): Query<MatchdayQuery>,
) -> ApiResult<impl IntoResponse> {
    let fixtures = fixtures_for(&state, &league_id, q.matchday).await?;
    let upcoming: Vec<_> = fixtures.into_iter().filter(|f| !f.is_played()).collect();
    Ok(axum::Json(serde_json::json!({ "ok": true, "fixtures": upcoming })))
}

async fn results(
    State(state): State<AppState>,
    Path(league_id): Path<String>,
    Query(q): Query<MatchdayQuery>,
) -> ApiResult<impl IntoResponse> {
    let fixtures = fixtures_for(&state, &league_id, q.matchday).await?;
    let played: Vec<_> = fixtures.into_iter().filter(|f| f.is_played()).collect();
    Ok(axum::Json(serde_json::json!({ "ok": true, "results": played })))
}
