use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::error::AppResult;
use crate::player::{CompletionOutcome, League};

pub const ADVISORY_LOCK_KEY: i64 = 0x5350_5745_4550; // "SWEEP" packed, arbitrary fixed key

#[derive(Debug, Clone, Copy)]
pub struct SweepState {
    pub last_sweep_utc_day: Option<i64>,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub run_count: i64,
}

/// A player's fate for this sweep, decided purely from rating/league —
/// no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepClassification {
    Skip,
    Promote(League),
    Complete,
}

pub fn classify(current_league: League, overall_rating: i32) -> SweepClassification {
    if overall_rating < current_league.promotion_threshold() {
        return SweepClassification::Skip;
    }
    match current_league.next() {
        Some(next) => SweepClassification::Promote(next),
        None => SweepClassification::Complete,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepRunSummary {
    pub ran: bool,
    pub reason: String,
    pub utc_day: i64,
    pub total_active_players: usize,
    pub promotions: Vec<PromotionRecord>,
    pub promotions_truncated: bool,
    pub completions: Vec<CompletionRecord>,
    pub skipped: Vec<String>,
    pub skipped_truncated: bool,
    pub errors: Vec<PlayerErrorRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionRecord {
    pub player_id: String,
    pub from_league: League,
    pub to_league: League,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub player_id: String,
    pub already_completed: bool,
    pub days_to_premier: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerErrorRecord {
    pub player_id: String,
    pub error: String,
}

pub const CAP: usize = 100;

impl From<(String, CompletionOutcome)> for CompletionRecord {
    fn from((player_id, outcome): (String, CompletionOutcome)) -> Self {
        CompletionRecord {
            player_id,
            already_completed: outcome.already_completed,
            days_to_premier: outcome.days_to_premier,
        }
    }
}

/// Port for the sweep's persistence needs: the advisory-lock-guarded
/// state transition plus bulk classification/completion.
#[async_trait]
pub trait SweepStore: Send + Sync {
    /// Phase 1: acquire the advisory lock, lock+read the singleton row,
    /// and — unless already run today or `force` is false on a
    /// non-scheduled day — stamp it and commit. Returns `None` when the
    /// sweep short-circuits.
    async fn try_begin_sweep(&self, force: bool, now: DateTime<Utc>) -> AppResult<Option<i64>>;

    async fn status(&self) -> AppResult<SweepState>;

    /// Players currently `active`, ordered by id (phase 2).
    async fn list_active_players(&self) -> AppResult<Vec<(String, League, i32)>>;

    /// Run `completePlayerCareer` for one player in its own transaction.
    async fn complete_career(&self, player_id: &str) -> AppResult<CompletionOutcome>;

    /// One atomic UPDATE moving every still-active player in `player_ids`
    /// into `target_league` (phase 5, per-target-league batch).
    async fn promote_batch(&self, player_ids: &[String], target_league: League) -> AppResult<u64>;
}

/// Runs phases 2-5 of the sweep against an already-begun sweep (phase
/// 1's advisory-lock transaction has committed by the time this runs).
/// Promotion batches are grouped per target league so each
/// is one atomic `UPDATE`; completions run one-at-a-time in their own
/// transactions and their errors are collected rather than aborting
/// the batch.
pub async fn run_sweep(store: &dyn SweepStore, utc_day: i64) -> SweepRunSummary {
    let players = match store.list_active_players().await {
        Ok(p) => p,
        Err(e) => {
            return SweepRunSummary {
                ran: true,
                reason: format!("failed to list active players: {}", e.message()),
                utc_day,
                total_active_players: 0,
                promotions: Vec::new(),
                promotions_truncated: false,
                completions: Vec::new(),
                skipped: Vec::new(),
                skipped_truncated: false,
                errors: Vec::new(),
            };
        }
    };

    let total_active_players = players.len();
    let mut promotions = Vec::new();
    let mut skipped = Vec::new();
    let mut completion_candidates = Vec::new();
    let mut promotion_batches: std::collections::BTreeMap<League, Vec<String>> =
        std::collections::BTreeMap::new();

    for (player_id, league, rating) in &players {
        match classify(*league, *rating) {
            SweepClassification::Skip => {
                if skipped.len() < CAP {
                    skipped.push(player_id.clone());
                }
            }
            SweepClassification::Promote(next) => {
                promotion_batches.entry(next).or_default().push(player_id.clone());
                if promotions.len() < CAP {
                    promotions.push(PromotionRecord {
                        player_id: player_id.clone(),
                        from_league: *league,
                        to_league: next,
                    });
                }
            }
            SweepClassification::Complete => completion_candidates.push(player_id.clone()),
        }
    }

    let promotions_truncated = promotion_batches.values().map(|v| v.len()).sum::<usize>() > CAP;
    let skipped_truncated = skipped.len() >= CAP
        && players
            .iter()
            .filter(|(_, league, rating)| classify(*league, *rating) == SweepClassification::Skip)
            .count()
            > CAP;

    let mut completions = Vec::new();
    let mut errors = Vec::new();

    for player_id in completion_candidates {
        match store.complete_career(&player_id).await {
            Ok(outcome) => completions.push(CompletionRecord::from((player_id, outcome))),
            Err(e) => {
                warn!("sweep utc_day={utc_day}: completion failed for player {player_id}: {}", e.message());
                errors.push(PlayerErrorRecord {
                    player_id,
                    error: e.message().to_string(),
                });
            }
        }
    }

    for (target_league, player_ids) in promotion_batches {
        let count = player_ids.len();
        if let Err(e) = store.promote_batch(&player_ids, target_league).await {
            warn!(
                "sweep utc_day={utc_day}: promotion batch to {target_league:?} ({count} players) failed: {}",
                e.message()
            );
            for player_id in player_ids {
                errors.push(PlayerErrorRecord {
                    player_id,
                    error: e.message().to_string(),
                });
            }
        }
    }

    info!(
        "sweep utc_day={utc_day}: {total_active_players} active players, {} promotions, {} completions, {} errors",
        promotions.len(),
        completions.len(),
        errors.len()
    );

    SweepRunSummary {
        ran: true,
        reason: "sweep executed".to_string(),
        utc_day,
        total_active_players,
        promotions,
        promotions_truncated,
        completions,
        skipped,
        skipped_truncated,
        errors,
    }
}

/// Full sweep entry point: phase 1 (advisory-lock gated state
/// transition) followed by phases 2-5, or a short-circuit summary if
/// phase 1 declines to run.
pub async fn execute(store: &dyn SweepStore, force: bool, now: DateTime<Utc>) -> AppResult<SweepRunSummary> {
    let today = crate::time_util::utc_day(now);

    match store.try_begin_sweep(force, now).await? {
        None => {
            let reason = if force {
                "already ran today"
            } else if !crate::time_util::is_sweep_day(today) {
                "not a scheduled sweep day"
            } else {
                "already ran today"
            };
            info!("sweep utc_day={today}: short-circuited ({reason})");
            Ok(SweepRunSummary {
                ran: false,
                reason: reason.to_string(),
                utc_day: today,
                total_active_players: 0,
                promotions: Vec::new(),
                promotions_truncated: false,
                completions: Vec::new(),
                skipped: Vec::new(),
                skipped_truncated: false,
                errors: Vec::new(),
            })
        }
        Some(day) => Ok(run_sweep(store, day).await),
    }
}
