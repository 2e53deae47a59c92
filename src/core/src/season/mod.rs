pub mod schedule;
pub mod simulate;
pub mod table;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;

pub const CLUBS_PER_TIER: usize = 24;
pub const FIXTURES_PER_MATCHDAY: usize = CLUBS_PER_TIER / 2;
pub const TOTAL_MATCHDAYS: i32 = 46; // round-robin home+away over 24 clubs: 2*(24-1)

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EflTier {
    Championship,
    LeagueOne,
    LeagueTwo,
}

impl EflTier {
    pub const ALL: [EflTier; 3] = [EflTier::Championship, EflTier::LeagueOne, EflTier::LeagueTwo];

    pub fn as_str(&self) -> &'static str {
        match self {
            EflTier::Championship => "championship",
            EflTier::LeagueOne => "league_one",
            EflTier::LeagueTwo => "league_two",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "championship" => Some(EflTier::Championship),
            "league_one" => Some(EflTier::LeagueOne),
            "league_two" => Some(EflTier::LeagueTwo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone)]
pub struct Season {
    pub id: uuid::Uuid,
    pub efl_tier: EflTier,
    pub current_matchday: i32,
    pub total_matchdays: i32,
    pub fixtures_generated: bool,
    pub status: SeasonStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FixtureStatus {
    Upcoming,
    Played,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fixture {
    pub id: uuid::Uuid,
    pub season_id: uuid::Uuid,
    pub matchday: i32,
    pub home_club_id: i32,
    pub away_club_id: i32,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub status: FixtureStatus,
    pub played_at: Option<DateTime<Utc>>,
}

impl Fixture {
    /// A fixture counts as played when either goals are recorded or
    /// `played_at` is set. Deliberately avoids matching on the literal
    /// status string, which varies across write paths.
    pub fn is_played(&self) -> bool {
        self.played_at.is_some() || (self.home_goals.is_some() && self.away_goals.is_some())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TeamSeason {
    pub club_id: i32,
    pub played: i32,
    pub won: i32,
    pub drawn: i32,
    pub lost: i32,
    pub goals_for: i32,
    pub goals_against: i32,
}

impl TeamSeason {
    pub fn goal_difference(&self) -> i32 {
        self.goals_for - self.goals_against
    }

    pub fn points(&self) -> i32 {
        3 * self.won + self.drawn
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixtureResult {
    pub home_club_id: i32,
    pub away_club_id: i32,
    pub home_goals: i32,
    pub away_goals: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierOutcome {
    Ok,
    AlreadyPlayed,
    Aborted,
    Error,
    Skipped,
    NewSeasonCreated,
    SeasonCompleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierSimulationResult {
    pub efl_tier: EflTier,
    pub outcome: TierOutcome,
    pub matchday: Option<i32>,
    pub detail: Option<String>,
}

/// Port for everything the matchday simulator and league-table reads
/// need. Implemented over Postgres in the `database` crate.
#[async_trait]
pub trait SeasonStore: Send + Sync {
    async fn get_or_create_active_season(&self, tier: EflTier) -> AppResult<(Season, bool)>;
    async fn get_progress(&self, season_id: uuid::Uuid) -> AppResult<i32>;
    async fn set_progress(&self, season_id: uuid::Uuid, matchday: i32) -> AppResult<()>;
    async fn complete_season(&self, season_id: uuid::Uuid) -> AppResult<()>;
    async fn fixtures_for_matchday(
        &self,
        season_id: uuid::Uuid,
        matchday: i32,
    ) -> AppResult<Vec<Fixture>>;
    async fn generate_fixtures(
        &self,
        season_id: uuid::Uuid,
        matchday: i32,
        pairings: &[(i32, i32)],
    ) -> AppResult<()>;
    async fn write_results(
        &self,
        season_id: uuid::Uuid,
        matchday: i32,
        results: &[FixtureResult],
    ) -> AppResult<()>;
    async fn apply_standings(
        &self,
        season_id: uuid::Uuid,
        deltas: &[TeamSeason],
    ) -> AppResult<()>;
    async fn standings(&self, season_id: uuid::Uuid) -> AppResult<Vec<TeamSeason>>;
    async fn club_name(&self, club_id: i32) -> AppResult<String>;
    /// The fixed 24-club roster for a tier, stably sorted by id.
    async fn clubs_for_tier(&self, tier: EflTier) -> AppResult<Vec<i32>>;
}
