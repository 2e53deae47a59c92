use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use core::error::AppResult;
use core::season::{EflTier, Fixture, FixtureResult, FixtureStatus, Season, SeasonStatus, SeasonStore, TeamSeason};
use sqlx::PgPool;

use crate::pool::classify_db_error;

pub struct PgSeasonStore {
    pub pool: PgPool,
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;
const WRITE_THROTTLE_MS: u64 = 100;

/// Retries a fallible write with exponential backoff, capped at
/// `MAX_ATTEMPTS`.
async fn retry<F, Fut, T>(mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(_) if attempt < MAX_ATTEMPTS => {
                let backoff = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(sqlx::FromRow)]
struct FixtureRow {
    id: uuid::Uuid,
    season_id: uuid::Uuid,
    matchday: i32,
    home_club_id: i32,
    away_club_id: i32,
    home_goals: Option<i32>,
    away_goals: Option<i32>,
    status: String,
    played_at: Option<chrono::DateTime<Utc>>,
}

fn row_to_fixture(r: FixtureRow) -> Fixture {
    Fixture {
        id: r.id,
        season_id: r.season_id,
        matchday: r.matchday,
        home_club_id: r.home_club_id,
        away_club_id: r.away_club_id,
        home_goals: r.home_goals,
        away_goals: r.away_goals,
        status: if r.status == "PLAYED" {
            FixtureStatus::Played
        } else {
            FixtureStatus::Upcoming
        },
        played_at: r.played_at,
    }
}

#[async_trait]
impl SeasonStore for PgSeasonStore {
    async fn get_or_create_active_season(&self, tier: EflTier) -> AppResult<(Season, bool)> {
        let existing = sqlx::query_as::<_, (uuid::Uuid, i32, i32, bool, String)>(
            "select id, current_matchday, total_matchdays, fixtures_generated, status \
             from seasons where efl_tier = $1 and status = 'active'",
        )
        .bind(tier.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;

        if let Some((id, current_matchday, total_matchdays, fixtures_generated, status)) = existing {
            return Ok((
                Season {
                    id,
                    efl_tier: tier,
                    current_matchday,
                    total_matchdays,
                    fixtures_generated,
                    status: if status == "completed" {
                        SeasonStatus::Completed
                    } else {
                        SeasonStatus::Active
                    },
                },
                false,
            ));
        }

        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        let id: (uuid::Uuid,) = sqlx::query_as(
            "insert into seasons (efl_tier, current_matchday, total_matchdays, fixtures_generated, status) \
             values ($1, 1, 46, false, 'active') \
             on conflict (efl_tier) where status = 'active' do nothing \
             returning id",
        )
        .bind(tier.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .map(|(id,): (uuid::Uuid,)| (id,))
        .unwrap_or((uuid::Uuid::nil(),));

        if id.0.is_nil() {
            // lost the race to a concurrent creator; read back what exists
            tx.rollback().await.map_err(classify_db_error)?;
            let (id, current_matchday, total_matchdays, fixtures_generated, status) = sqlx::query_as::<
                _,
                (uuid::Uuid, i32, i32, bool, String),
            >(
                "select id, current_matchday, total_matchdays, fixtures_generated, status \
                 from seasons where efl_tier = $1 and status = 'active'",
            )
            .bind(tier.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(classify_db_error)?;

            return Ok((
                Season {
                    id,
                    efl_tier: tier,
                    current_matchday,
                    total_matchdays,
                    fixtures_generated,
                    status: if status == "completed" {
                        SeasonStatus::Completed
                    } else {
                        SeasonStatus::Active
                    },
                },
                false,
            ));
        }

        sqlx::query("insert into season_progress (season_id, current_matchday) values ($1, 1)")
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;

        Ok((
            Season {
                id: id.0,
                efl_tier: tier,
                current_matchday: 1,
                total_matchdays: 46,
                fixtures_generated: false,
                status: SeasonStatus::Active,
            },
            true,
        ))
    }

    async fn get_progress(&self, season_id: uuid::Uuid) -> AppResult<i32> {
        let row: (i32,) = sqlx::query_as("select current_matchday from season_progress where season_id = $1")
            .bind(season_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_db_error)?;
        Ok(row.0)
    }

    async fn set_progress(&self, season_id: uuid::Uuid, matchday: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        sqlx::query("update season_progress set current_matchday = $2 where season_id = $1")
            .bind(season_id)
            .bind(matchday)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        sqlx::query("update seasons set current_matchday = $2 where id = $1")
            .bind(season_id)
            .bind(matchday)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        tx.commit().await.map_err(classify_db_error)?;
        Ok(())
    }

    async fn complete_season(&self, season_id: uuid::Uuid) -> AppResult<()> {
        sqlx::query("update seasons set status = 'completed' where id = $1")
            .bind(season_id)
            .execute(&self.pool)
            .await
            .map_err(classify_db_error)?;
        Ok(())
    }

    async fn fixtures_for_matchday(&self, season_id: uuid::Uuid, matchday: i32) -> AppResult<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>(
            "select id, season_id, matchday, home_club_id, away_club_id, home_goals, away_goals, \
             status, played_at from fixtures where season_id = $1 and matchday = $2 order by id",
        )
        .bind(season_id)
        .bind(matchday)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(rows.into_iter().map(row_to_fixture).collect())
    }

    async fn generate_fixtures(
        &self,
        season_id: uuid::Uuid,
        matchday: i32,
        pairings: &[(i32, i32)],
    ) -> AppResult<()> {
        let tier: (String,) = sqlx::query_as("select efl_tier from seasons where id = $1")
            .bind(season_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_db_error)?;

        for (i, (home, away)) in pairings.iter().enumerate() {
            retry(|| async {
                sqlx::query(
                    "insert into fixtures (season_id, efl_tier, matchday, home_club_id, away_club_id, status) \
                     values ($1, $2, $3, $4, $5, 'UPCOMING')",
                )
                .bind(season_id)
                .bind(&tier.0)
                .bind(matchday)
                .bind(home)
                .bind(away)
                .execute(&self.pool)
                .await
                .map(|_| ())
            })
            .await
            .map_err(classify_db_error)?;

            if i + 1 < pairings.len() {
                tokio::time::sleep(Duration::from_millis(WRITE_THROTTLE_MS)).await;
            }
        }

        sqlx::query("update seasons set fixtures_generated = true where id = $1")
            .bind(season_id)
            .execute(&self.pool)
            .await
            .map_err(classify_db_error)?;

        Ok(())
    }

    async fn write_results(&self, season_id: uuid::Uuid, matchday: i32, results: &[FixtureResult]) -> AppResult<()> {
        for (i, r) in results.iter().enumerate() {
            retry(|| async {
                sqlx::query(
                    "update fixtures set home_goals = $4, away_goals = $5, status = 'PLAYED', played_at = now() \
                     where season_id = $1 and matchday = $2 and home_club_id = $3 and away_club_id = $6",
                )
                .bind(season_id)
                .bind(matchday)
                .bind(r.home_club_id)
                .bind(r.home_goals)
                .bind(r.away_goals)
                .bind(r.away_club_id)
                .execute(&self.pool)
                .await
                .map(|_| ())
            })
            .await
            .map_err(classify_db_error)?;

            if i + 1 < results.len() {
                tokio::time::sleep(Duration::from_millis(WRITE_THROTTLE_MS)).await;
            }
        }
        Ok(())
    }

    async fn apply_standings(&self, season_id: uuid::Uuid, deltas: &[TeamSeason]) -> AppResult<()> {
        for delta in deltas {
            retry(|| async {
                sqlx::query(
                    "insert into team_seasons (season_id, club_id, played, won, drawn, lost, goals_for, goals_against) \
                     values ($1, $2, $3, $4, $5, $6, $7, $8) \
                     on conflict (season_id, club_id) do update set \
                     played = team_seasons.played + excluded.played, \
                     won = team_seasons.won + excluded.won, \
                     drawn = team_seasons.drawn + excluded.drawn, \
                     lost = team_seasons.lost + excluded.lost, \
                     goals_for = team_seasons.goals_for + excluded.goals_for, \
                     goals_against = team_seasons.goals_against + excluded.goals_against",
                )
                .bind(season_id)
                .bind(delta.club_id)
                .bind(delta.played)
                .bind(delta.won)
                .bind(delta.drawn)
                .bind(delta.lost)
                .bind(delta.goals_for)
                .bind(delta.goals_against)
                .execute(&self.pool)
                .await
                .map(|_| ())
            })
            .await
            .map_err(classify_db_error)?;
        }
        Ok(())
    }

    async fn standings(&self, season_id: uuid::Uuid) -> AppResult<Vec<TeamSeason>> {
        let rows = sqlx::query_as::<_, (i32, i32, i32, i32, i32, i32, i32)>(
            "select club_id, played, won, drawn, lost, goals_for, goals_against \
             from team_seasons where season_id = $1",
        )
        .bind(season_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(rows
            .into_iter()
            .map(|(club_id, played, won, drawn, lost, goals_for, goals_against)| TeamSeason {
                club_id,
                played,
                won,
                drawn,
                lost,
                goals_for,
                goals_against,
            })
            .collect())
    }

    async fn club_name(&self, club_id: i32) -> AppResult<String> {
        let row: (String,) = sqlx::query_as("select name from clubs where id = $1")
            .bind(club_id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_db_error)?;
        Ok(row.0)
    }

    async fn clubs_for_tier(&self, tier: EflTier) -> AppResult<Vec<i32>> {
        let rows: Vec<(i32,)> = sqlx::query_as("select id from clubs where efl_tier = $1 order by id")
            .bind(tier.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(classify_db_error)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
