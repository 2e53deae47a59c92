use async_trait::async_trait;
use chrono::Utc;
use core::error::{AppError, AppResult};
use core::player::{
    CareerStatus, CoachStats, CompletionOutcome, League, NewPlayer, Player, PlayerCareerStore,
    ProgressPatch, accumulate_completion,
};
use core::time_util::days_to_premier;
use sqlx::{PgPool, Postgres, Transaction};

use crate::pool::classify_db_error;

pub struct PgPlayerStore {
    pub pool: PgPool,
}

fn row_to_player(row: PlayerRow) -> Player {
    Player {
        id: row.id,
        user_id: row.user_id,
        display_name: row.display_name,
        overall_rating: row.overall_rating,
        current_league: League::parse(&row.current_league).unwrap_or(League::LeagueTwo),
        career_status: if row.career_status == "completed" {
            CareerStatus::Completed
        } else {
            CareerStatus::Active
        },
        career_started_at: row.career_started_at,
        career_completed_at: row.career_completed_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[derive(sqlx::FromRow)]
struct PlayerRow {
    id: String,
    user_id: String,
    display_name: String,
    overall_rating: i32,
    current_league: String,
    career_status: String,
    career_started_at: chrono::DateTime<Utc>,
    career_completed_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

/// The keystone atomic operation. Runs entirely within the caller's
/// transaction so the sweep and the HTTP route share one implementation
/// regardless of who opened the transaction.
pub async fn complete_career_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    player_id: &str,
) -> AppResult<CompletionOutcome> {
    let row = sqlx::query_as::<_, PlayerRow>(
        "select id, user_id, display_name, overall_rating, current_league, career_status, \
         career_started_at, career_completed_at, created_at, updated_at \
         from players where id = $1 for update",
    )
    .bind(player_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(classify_db_error)?
    .ok_or_else(|| AppError::not_found(format!("player {player_id} not found")))?;

    if row.career_status == "completed" {
        return Ok(CompletionOutcome {
            already_completed: true,
            days_to_premier: None,
        });
    }

    let now = Utc::now();
    let days = days_to_premier(row.career_started_at, now) as i32;

    sqlx::query(
        "update players set career_status = 'completed', career_completed_at = $2, updated_at = $2 \
         where id = $1",
    )
    .bind(player_id)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(classify_db_error)?;

    let insert = sqlx::query(
        "insert into career_completions (player_id, user_id, days_to_premier, completed_at) \
         values ($1, $2, $3, $4) on conflict (player_id) do nothing",
    )
    .bind(player_id)
    .bind(&row.user_id)
    .bind(days)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(classify_db_error)?;

    if insert.rows_affected() == 0 {
        // another concurrent completer won the race on the unique constraint
        return Ok(CompletionOutcome {
            already_completed: true,
            days_to_premier: None,
        });
    }

    let existing = sqlx::query_as::<_, (i32, i64, Option<i32>)>(
        "select completions_count, total_days_sum, best_days_to_premier from coach_stats \
         where user_id = $1 for update",
    )
    .bind(&row.user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(classify_db_error)?;

    let (count, sum, best) = existing.unwrap_or((0, 0, None));
    let (new_count, new_sum, new_best, new_avg) = accumulate_completion(count, sum, best, days);

    sqlx::query(
        "insert into coach_stats (user_id, completions_count, total_days_sum, best_days_to_premier, avg_days_to_premier) \
         values ($1, $2, $3, $4, $5) \
         on conflict (user_id) do update set completions_count = $2, total_days_sum = $3, \
         best_days_to_premier = $4, avg_days_to_premier = $5",
    )
    .bind(&row.user_id)
    .bind(new_count)
    .bind(new_sum)
    .bind(new_best)
    .bind(new_avg)
    .execute(&mut **tx)
    .await
    .map_err(classify_db_error)?;

    let membership = sqlx::query_as::<_, (uuid::Uuid,)>(
        "select squad_id from squad_members where user_id = $1 and status = 'active'",
    )
    .bind(&row.user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(classify_db_error)?;

    if let Some((squad_id,)) = membership {
        sqlx::query(
            "update coaching_squads set total_points = total_points + 1, \
             unspent_points = unspent_points + 1, updated_at = $2 where id = $1",
        )
        .bind(squad_id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(classify_db_error)?;

        sqlx::query(
            "update squad_members set points_contributed = points_contributed + 1 \
             where squad_id = $1 and user_id = $2",
        )
        .bind(squad_id)
        .bind(&row.user_id)
        .execute(&mut **tx)
        .await
        .map_err(classify_db_error)?;

        sqlx::query(
            "insert into squad_point_events (squad_id, user_id, points, reason) \
             values ($1, $2, 1, 'premier_completion')",
        )
        .bind(squad_id)
        .bind(&row.user_id)
        .execute(&mut **tx)
        .await
        .map_err(classify_db_error)?;
    }

    Ok(CompletionOutcome {
        already_completed: false,
        days_to_premier: Some(days),
    })
}

#[async_trait]
impl PlayerCareerStore for PgPlayerStore {
    async fn create_player(&self, input: NewPlayer) -> AppResult<Player> {
        if input.id.trim().is_empty() || input.user_id.trim().is_empty() {
            return Err(AppError::validation("player_id and user_id are required"));
        }

        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        let display_name = input.display_name.unwrap_or_default();
        let rating = input.overall_rating.unwrap_or(core::player::DEFAULT_RATING);
        let league = input.current_league.unwrap_or(League::LeagueTwo);

        sqlx::query(
            "insert into players (id, user_id, display_name, overall_rating, current_league) \
             values ($1, $2, $3, $4, $5) \
             on conflict (id) do update set display_name = \
             case when excluded.display_name <> '' then excluded.display_name else players.display_name end",
        )
        .bind(&input.id)
        .bind(&input.user_id)
        .bind(&display_name)
        .bind(rating)
        .bind(league.as_str())
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        sqlx::query(
            "insert into coach_stats (user_id, display_name, completions_count, total_days_sum) \
             values ($1, $2, 0, 0) on conflict (user_id) do nothing",
        )
        .bind(&input.user_id)
        .bind(&display_name)
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let row = sqlx::query_as::<_, PlayerRow>(
            "select id, user_id, display_name, overall_rating, current_league, career_status, \
             career_started_at, career_completed_at, created_at, updated_at from players where id = $1",
        )
        .bind(&input.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;
        Ok(row_to_player(row))
    }

    async fn get_player(&self, player_id: &str) -> AppResult<Option<Player>> {
        let row = sqlx::query_as::<_, PlayerRow>(
            "select id, user_id, display_name, overall_rating, current_league, career_status, \
             career_started_at, career_completed_at, created_at, updated_at from players where id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(row.map(row_to_player))
    }

    async fn update_progress(
        &self,
        player_id: &str,
        patch: ProgressPatch,
    ) -> AppResult<Option<Player>> {
        if patch.is_empty() {
            return Err(AppError::validation("at least one field must be provided"));
        }

        let row = sqlx::query_as::<_, PlayerRow>(
            "update players set \
             overall_rating = coalesce($2, overall_rating), \
             current_league = coalesce($3, current_league), \
             updated_at = now() \
             where id = $1 and career_status = 'active' \
             returning id, user_id, display_name, overall_rating, current_league, career_status, \
             career_started_at, career_completed_at, created_at, updated_at",
        )
        .bind(player_id)
        .bind(patch.overall_rating)
        .bind(patch.current_league.map(|l| l.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(row.map(row_to_player))
    }

    async fn complete_career(&self, player_id: &str) -> AppResult<CompletionOutcome> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        let outcome = complete_career_in_tx(&mut tx, player_id).await?;
        tx.commit().await.map_err(classify_db_error)?;
        Ok(outcome)
    }

    async fn coach_stats(&self, user_id: &str) -> AppResult<Option<CoachStats>> {
        let row = sqlx::query_as::<_, (String, String, i32, Option<i32>, Option<i32>)>(
            "select user_id, display_name, completions_count, best_days_to_premier, avg_days_to_premier \
             from coach_stats where user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(row.map(|(user_id, display_name, completions_count, best_days_to_premier, avg_days_to_premier)| {
            CoachStats {
                user_id,
                display_name,
                completions_count,
                best_days_to_premier,
                avg_days_to_premier,
            }
        }))
    }
}
