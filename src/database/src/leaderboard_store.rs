use async_trait::async_trait;
use core::error::AppResult;
use core::leaderboard::{CoachRankable, GLOBAL_BOARD_SIZE, GlobalLeaderboard, GlobalLeaderboardEntry, LeaderboardStore};
use sqlx::PgPool;

use crate::pool::classify_db_error;

pub struct PgLeaderboardStore {
    pub pool: PgPool,
}

#[async_trait]
impl LeaderboardStore for PgLeaderboardStore {
    async fn global_board(&self, caller_user_id: &str, caller_display_name: &str) -> AppResult<GlobalLeaderboard> {
        // Durable presence: the caller's stats row always exists, even
        // at zero, so the window query below can find it.
        sqlx::query(
            "insert into coach_stats (user_id, display_name, completions_count, total_days_sum) \
             values ($1, $2, 0, 0) on conflict (user_id) do nothing",
        )
        .bind(caller_user_id)
        .bind(caller_display_name)
        .execute(&self.pool)
        .await
        .map_err(classify_db_error)?;

        let rows: Vec<(String, String, i32, Option<i32>, Option<i32>, i64)> = sqlx::query_as(
            "select user_id, display_name, completions_count, best_days_to_premier, avg_days_to_premier, rnk \
             from ( \
               select *, row_number() over ( \
                 order by completions_count desc, \
                 best_days_to_premier asc nulls last, \
                 avg_days_to_premier asc nulls last \
               ) as rnk \
               from coach_stats \
             ) ranked \
             where rnk <= $1 or user_id = $2 \
             order by rnk",
        )
        .bind(GLOBAL_BOARD_SIZE)
        .bind(caller_user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        let total_coaches: (i64,) = sqlx::query_as("select count(*) from coach_stats")
            .fetch_one(&self.pool)
            .await
            .map_err(classify_db_error)?;

        let mut entries = Vec::with_capacity(rows.len());
        let mut my_entry = None;

        for (user_id, display_name, completions_count, best, avg, rank) in rows {
            let entry = GlobalLeaderboardEntry {
                rank,
                coach: CoachRankable {
                    user_id: user_id.clone(),
                    display_name,
                    completions_count,
                    best_days_to_premier: best,
                    avg_days_to_premier: avg,
                },
            };
            if user_id == caller_user_id {
                my_entry = Some(entry.clone());
            }
            if rank <= GLOBAL_BOARD_SIZE {
                entries.push(entry);
            }
        }

        let my_entry = my_entry.unwrap_or(GlobalLeaderboardEntry {
            rank: total_coaches.0 + 1,
            coach: CoachRankable {
                user_id: caller_user_id.to_string(),
                display_name: caller_display_name.to_string(),
                completions_count: 0,
                best_days_to_premier: None,
                avg_days_to_premier: None,
            },
        });

        Ok(GlobalLeaderboard {
            entries,
            my_entry,
            total_coaches: total_coaches.0,
        })
    }
}
