use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;

pub const GLOBAL_BOARD_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CoachRankable {
    pub user_id: String,
    pub display_name: String,
    pub completions_count: i32,
    pub best_days_to_premier: Option<i32>,
    pub avg_days_to_premier: Option<i32>,
}

/// Global/group ranking order: completions desc, best asc (nulls last),
/// avg asc (nulls last).
pub fn compare_coaches(a: &CoachRankable, b: &CoachRankable) -> Ordering {
    b.completions_count
        .cmp(&a.completions_count)
        .then_with(|| compare_nulls_last(a.best_days_to_premier, b.best_days_to_premier))
        .then_with(|| compare_nulls_last(a.avg_days_to_premier, b.avg_days_to_premier))
}

fn compare_nulls_last(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn rank_coaches(mut rows: Vec<CoachRankable>) -> Vec<(i64, CoachRankable)> {
    rows.sort_by(compare_coaches);
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| (i as i64 + 1, row))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadRankable {
    pub squad_id: uuid::Uuid,
    pub name: String,
    pub total_points: i64,
    pub level: i32,
    pub updated_at: DateTime<Utc>,
}

/// Squad ranking order: points desc, level desc, `updated_at` asc.
/// The asc tiebreak rewards squads that haven't touched their totals
/// recently; see DESIGN.md for why we kept it anyway.
pub fn compare_squads(a: &SquadRankable, b: &SquadRankable) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| b.level.cmp(&a.level))
        .then_with(|| a.updated_at.cmp(&b.updated_at))
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalLeaderboardEntry {
    pub rank: i64,
    pub coach: CoachRankable,
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalLeaderboard {
    pub entries: Vec<GlobalLeaderboardEntry>,
    pub my_entry: GlobalLeaderboardEntry,
    pub total_coaches: i64,
}

/// Port for the windowed leaderboard read: ranks every row and selects
/// `rank <= 100 OR user_id = caller`, upserting an empty stats row for
/// the caller first so their presence is durable.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    async fn global_board(&self, caller_user_id: &str, caller_display_name: &str) -> AppResult<GlobalLeaderboard>;
}
