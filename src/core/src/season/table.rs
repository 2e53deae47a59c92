use super::{FixtureResult, TeamSeason};

/// One row of a league table, joined with its club's display name for
/// the final tiebreak.
#[derive(Debug, Clone)]
pub struct StandingsRow {
    pub club_id: i32,
    pub name: String,
    pub stats: TeamSeason,
}

/// Fold a batch of fixture results into per-club deltas, keyed by `club_id`.
pub fn aggregate_deltas(results: &[FixtureResult]) -> Vec<TeamSeason> {
    use std::collections::BTreeMap;

    let mut deltas: BTreeMap<i32, TeamSeason> = BTreeMap::new();

    for r in results {
        let home = deltas.entry(r.home_club_id).or_insert(TeamSeason {
            club_id: r.home_club_id,
            ..Default::default()
        });
        home.played += 1;
        home.goals_for += r.home_goals;
        home.goals_against += r.away_goals;

        let away_club_id = r.away_club_id;

        match r.home_goals.cmp(&r.away_goals) {
            std::cmp::Ordering::Greater => home.won += 1,
            std::cmp::Ordering::Equal => home.drawn += 1,
            std::cmp::Ordering::Less => home.lost += 1,
        }

        let away = deltas.entry(away_club_id).or_insert(TeamSeason {
            club_id: away_club_id,
            ..Default::default()
        });
        away.played += 1;
        away.goals_for += r.away_goals;
        away.goals_against += r.home_goals;

        match r.away_goals.cmp(&r.home_goals) {
            std::cmp::Ordering::Greater => away.won += 1,
            std::cmp::Ordering::Equal => away.drawn += 1,
            std::cmp::Ordering::Less => away.lost += 1,
        }
    }

    deltas.into_values().collect()
}

/// Sort standings `points desc, goal_difference desc, goals_for desc,
/// name asc`.
pub fn sort_standings(rows: &mut [StandingsRow]) {
    rows.sort_by(|a, b| {
        b.stats
            .points()
            .cmp(&a.stats.points())
            .then_with(|| b.stats.goal_difference().cmp(&a.stats.goal_difference()))
            .then_with(|| b.stats.goals_for.cmp(&a.stats.goals_for))
            .then_with(|| a.name.cmp(&b.name))
    });
}
