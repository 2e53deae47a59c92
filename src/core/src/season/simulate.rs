use log::{info, warn};
use rand::Rng;

use super::schedule::round_robin;
use super::table::aggregate_deltas;
use super::{EflTier, FixtureResult, SeasonStore, TierOutcome, TierSimulationResult};

/// Home/away goal intensities for the Poisson match model, kept as
/// named constants rather than scattered across call sites.
pub const HOME_LAMBDA: f64 = 1.45;
pub const AWAY_LAMBDA: f64 = 1.15;
pub const GOAL_CAP: i32 = 7;

/// Knuth's algorithm for a Poisson-distributed sample, capped so a
/// freak draw can't produce an absurd scoreline.
pub fn sample_poisson_capped(rng: &mut impl Rng, lambda: f64, cap: i32) -> i32 {
    let l = (-lambda).exp();
    let mut k = 0i32;
    let mut p = 1.0f64;
    loop {
        k += 1;
        p *= rng.random::<f64>();
        if p <= l {
            break;
        }
    }
    (k - 1).min(cap)
}

fn err(tier: EflTier, matchday: Option<i32>, detail: impl Into<String>) -> TierSimulationResult {
    let detail = detail.into();
    warn!("matchday sim {tier:?} matchday={matchday:?}: error ({detail})");
    TierSimulationResult {
        efl_tier: tier,
        outcome: TierOutcome::Error,
        matchday,
        detail: Some(detail),
    }
}

fn aborted(tier: EflTier, matchday: i32, detail: impl Into<String>) -> TierSimulationResult {
    let detail = detail.into();
    warn!("matchday sim {tier:?} matchday={matchday}: aborted ({detail})");
    TierSimulationResult {
        efl_tier: tier,
        outcome: TierOutcome::Aborted,
        matchday: Some(matchday),
        detail: Some(detail),
    }
}

/// Advance one tier's shared matchday counter by at most one matchday.
/// Every exit path short of a full simulate-and-commit leaves the
/// counters untouched.
pub async fn simulate_tier(
    store: &dyn SeasonStore,
    tier: EflTier,
    rng: &mut impl Rng,
) -> TierSimulationResult {
    let (season, created) = match store.get_or_create_active_season(tier).await {
        Ok(v) => v,
        Err(e) => return err(tier, None, e.message().to_string()),
    };

    if created {
        info!("matchday sim {tier:?}: new season created at matchday={}", season.current_matchday);
        return TierSimulationResult {
            efl_tier: tier,
            outcome: TierOutcome::NewSeasonCreated,
            matchday: Some(season.current_matchday),
            detail: None,
        };
    }

    let matchday = match store.get_progress(season.id).await {
        Ok(m) if m >= 1 => m,
        Ok(invalid) => return err(tier, None, format!("invalid matchday cursor: {invalid}")),
        Err(e) => return err(tier, None, e.message().to_string()),
    };

    if matchday > season.total_matchdays {
        return match store.complete_season(season.id).await {
            Ok(()) => {
                info!("matchday sim {tier:?}: season completed after matchday={}", matchday - 1);
                TierSimulationResult {
                    efl_tier: tier,
                    outcome: TierOutcome::SeasonCompleted,
                    matchday: Some(matchday),
                    detail: None,
                }
            }
            Err(e) => err(tier, Some(matchday), e.message().to_string()),
        };
    }

    let mut fixtures = match store.fixtures_for_matchday(season.id, matchday).await {
        Ok(f) => f,
        Err(e) => return err(tier, Some(matchday), e.message().to_string()),
    };

    if fixtures.is_empty() {
        let clubs = match store.clubs_for_tier(tier).await {
            Ok(c) => c,
            Err(e) => return err(tier, Some(matchday), e.message().to_string()),
        };
        let rounds = match round_robin(&clubs) {
            Ok(r) => r,
            Err(msg) => return err(tier, Some(matchday), msg),
        };
        let Some(pairings) = rounds.get((matchday - 1) as usize) else {
            return err(tier, Some(matchday), "matchday beyond generated schedule");
        };
        if let Err(e) = store.generate_fixtures(season.id, matchday, pairings).await {
            return err(tier, Some(matchday), e.message().to_string());
        }
        info!("matchday sim {tier:?} matchday={matchday}: fixtures generated on demand");
        fixtures = match store.fixtures_for_matchday(season.id, matchday).await {
            Ok(f) => f,
            Err(e) => return err(tier, Some(matchday), e.message().to_string()),
        };
    }

    let upcoming: Vec<_> = fixtures.iter().filter(|f| !f.is_played()).collect();
    let played_count = fixtures.len() - upcoming.len();

    if played_count == 12 && upcoming.is_empty() {
        return match store.set_progress(season.id, matchday + 1).await {
            Ok(()) => {
                info!("matchday sim {tier:?} matchday={matchday}: already played, advancing without resimulating");
                TierSimulationResult {
                    efl_tier: tier,
                    outcome: TierOutcome::AlreadyPlayed,
                    matchday: Some(matchday),
                    detail: None,
                }
            }
            Err(e) => err(tier, Some(matchday), e.message().to_string()),
        };
    }

    if upcoming.len() != 12 {
        return aborted(
            tier,
            matchday,
            format!("expected 12 upcoming fixtures, found {}", upcoming.len()),
        );
    }

    let results: Vec<FixtureResult> = upcoming
        .iter()
        .map(|f| FixtureResult {
            home_club_id: f.home_club_id,
            away_club_id: f.away_club_id,
            home_goals: sample_poisson_capped(rng, HOME_LAMBDA, GOAL_CAP),
            away_goals: sample_poisson_capped(rng, AWAY_LAMBDA, GOAL_CAP),
        })
        .collect();

    if let Err(e) = store.write_results(season.id, matchday, &results).await {
        return aborted(tier, matchday, e.message().to_string());
    }

    let verified = match store.fixtures_for_matchday(season.id, matchday).await {
        Ok(f) => f,
        Err(e) => return aborted(tier, matchday, e.message().to_string()),
    };
    let verified_played = verified.iter().filter(|f| f.is_played()).count();
    if verified_played < 12 {
        return aborted(
            tier,
            matchday,
            format!("post-write verification found only {verified_played} played fixtures"),
        );
    }

    let deltas = aggregate_deltas(&results);
    if let Err(e) = store.apply_standings(season.id, &deltas).await {
        return aborted(tier, matchday, e.message().to_string());
    }

    match store.set_progress(season.id, matchday + 1).await {
        Ok(()) => {
            info!("matchday sim {tier:?} matchday={matchday}: simulated and committed");
            TierSimulationResult {
                efl_tier: tier,
                outcome: TierOutcome::Ok,
                matchday: Some(matchday),
                detail: None,
            }
        }
        Err(e) => aborted(tier, matchday, e.message().to_string()),
    }
}

/// Run all three tiers and report whether the batch was a clean run or
/// a partial one some caller should surface as a 207.
pub async fn simulate_all_tiers(
    store: &dyn SeasonStore,
    rng: &mut impl Rng,
) -> Vec<TierSimulationResult> {
    let mut out = Vec::with_capacity(EflTier::ALL.len());
    for tier in EflTier::ALL {
        out.push(simulate_tier(store, tier, rng).await);
    }
    out
}

pub fn all_ok(results: &[TierSimulationResult]) -> bool {
    results.iter().all(|r| {
        matches!(
            r.outcome,
            TierOutcome::Ok
                | TierOutcome::AlreadyPlayed
                | TierOutcome::NewSeasonCreated
                | TierOutcome::SeasonCompleted
                | TierOutcome::Skipped
        )
    })
}
