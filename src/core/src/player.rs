use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum League {
    LeagueTwo,
    LeagueOne,
    Championship,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::LeagueTwo => "league_two",
            League::LeagueOne => "league_one",
            League::Championship => "championship",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "league_two" => Some(League::LeagueTwo),
            "league_one" => Some(League::LeagueOne),
            "championship" => Some(League::Championship),
            _ => None,
        }
    }

    /// Rating threshold that promotes (or completes, at the top tier) a
    /// player currently in this league.
    pub fn promotion_threshold(&self) -> i32 {
        match self {
            League::LeagueTwo => 70,
            League::LeagueOne => 78,
            League::Championship => 86,
        }
    }

    /// The league a promotion lands in. `None` at `Championship`, which
    /// promotes to a completed career instead of a higher league.
    pub fn next(&self) -> Option<League> {
        match self {
            League::LeagueTwo => Some(League::LeagueOne),
            League::LeagueOne => Some(League::Championship),
            League::Championship => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareerStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub overall_rating: i32,
    pub current_league: League,
    pub career_status: CareerStatus,
    pub career_started_at: DateTime<Utc>,
    pub career_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub id: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub overall_rating: Option<i32>,
    pub current_league: Option<League>,
}

pub const DEFAULT_RATING: i32 = 60;

#[derive(Debug, Clone, Default)]
pub struct ProgressPatch {
    pub overall_rating: Option<i32>,
    pub current_league: Option<League>,
}

impl ProgressPatch {
    pub fn is_empty(&self) -> bool {
        self.overall_rating.is_none() && self.current_league.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachStats {
    pub user_id: String,
    pub display_name: String,
    pub completions_count: i32,
    pub best_days_to_premier: Option<i32>,
    pub avg_days_to_premier: Option<i32>,
}

/// Recompute the incrementally-maintained `CoachStats` fields after one
/// more completion lands.
pub fn accumulate_completion(
    completions_count: i32,
    total_days_sum: i64,
    best: Option<i32>,
    days: i32,
) -> (i32, i64, Option<i32>, i32) {
    let new_count = completions_count + 1;
    let new_sum = total_days_sum + i64::from(days);
    let new_best = Some(best.map_or(days, |b| b.min(days)));
    let new_avg = round_div(new_sum, i64::from(new_count)) as i32;
    (new_count, new_sum, new_best, new_avg)
}

/// Round-half-up division, used for `avg_days_to_premier = round(total/count)`.
fn round_div(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    (2 * numerator + denominator) / (2 * denominator)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub already_completed: bool,
    pub days_to_premier: Option<i32>,
}

/// Port for the player-career slice of persistence. The Postgres
/// implementation lives in the `database` crate; unit tests in this
/// crate use an in-memory double implementing the same trait.
#[async_trait]
pub trait PlayerCareerStore: Send + Sync {
    async fn create_player(&self, input: NewPlayer) -> AppResult<Player>;
    async fn get_player(&self, player_id: &str) -> AppResult<Option<Player>>;
    async fn update_progress(
        &self,
        player_id: &str,
        patch: ProgressPatch,
    ) -> AppResult<Option<Player>>;
    async fn complete_career(&self, player_id: &str) -> AppResult<CompletionOutcome>;
    async fn coach_stats(&self, user_id: &str) -> AppResult<Option<CoachStats>>;
}
