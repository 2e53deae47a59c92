use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::error::AppResult;
use core::player::{CompletionOutcome, League};
use core::sweep::{ADVISORY_LOCK_KEY, SweepState, SweepStore};
use core::time_util::{is_sweep_day, utc_day};
use sqlx::PgPool;

use crate::player_store::complete_career_in_tx;
use crate::pool::{acquire_advisory_lock, classify_db_error};

pub struct PgSweepStore {
    pub pool: PgPool,
}

#[async_trait]
impl SweepStore for PgSweepStore {
    async fn try_begin_sweep(&self, force: bool, now: DateTime<Utc>) -> AppResult<Option<i64>> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        acquire_advisory_lock(&mut tx, ADVISORY_LOCK_KEY).await?;

        let (last_day,): (Option<i64>,) =
            sqlx::query_as("select last_sweep_utc_day from sweep_state where id = 1 for update")
                .fetch_one(&mut *tx)
                .await
                .map_err(classify_db_error)?;

        let today = utc_day(now);

        if !force && !is_sweep_day(today) {
            tx.rollback().await.map_err(classify_db_error)?;
            return Ok(None);
        }
        if last_day == Some(today) {
            tx.rollback().await.map_err(classify_db_error)?;
            return Ok(None);
        }

        sqlx::query(
            "update sweep_state set last_sweep_utc_day = $1, last_sweep_at = $2, \
             run_count = run_count + 1 where id = 1",
        )
        .bind(today)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;
        Ok(Some(today))
    }

    async fn status(&self) -> AppResult<SweepState> {
        let row: (Option<i64>, Option<DateTime<Utc>>, i64) = sqlx::query_as(
            "select last_sweep_utc_day, last_sweep_at, run_count from sweep_state where id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(SweepState {
            last_sweep_utc_day: row.0,
            last_sweep_at: row.1,
            run_count: row.2,
        })
    }

    async fn list_active_players(&self) -> AppResult<Vec<(String, League, i32)>> {
        let rows: Vec<(String, String, i32)> = sqlx::query_as(
            "select id, current_league, overall_rating from players \
             where career_status = 'active' order by id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, league, rating)| (id, League::parse(&league).unwrap_or(League::LeagueTwo), rating))
            .collect())
    }

    async fn complete_career(&self, player_id: &str) -> AppResult<CompletionOutcome> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        let outcome = complete_career_in_tx(&mut tx, player_id).await?;
        tx.commit().await.map_err(classify_db_error)?;
        Ok(outcome)
    }

    async fn promote_batch(&self, player_ids: &[String], target_league: League) -> AppResult<u64> {
        if player_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "update players set current_league = $1, updated_at = now() \
             where career_status = 'active' and id = any($2)",
        )
        .bind(target_league.as_str())
        .bind(player_ids)
        .execute(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(result.rows_affected())
    }
}
