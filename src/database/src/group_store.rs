use async_trait::async_trait;
use chrono::Utc;
use core::error::{AppError, AppResult};
use core::group::{GroupStore, JoinGroupOutcome, LeaderboardGroup, LeaderboardGroupMember};
use sqlx::PgPool;

use crate::pool::classify_db_error;

pub struct PgGroupStore {
    pub pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: uuid::Uuid,
    name: String,
    invite_code: String,
    created_by: String,
    created_at: chrono::DateTime<Utc>,
}

fn row_to_group(r: GroupRow) -> LeaderboardGroup {
    LeaderboardGroup {
        id: r.id,
        name: r.name,
        invite_code: r.invite_code,
        created_by: r.created_by,
        created_at: r.created_at,
    }
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn try_create_group(
        &self,
        user_id: &str,
        name: &str,
        candidate_code: &str,
    ) -> AppResult<Option<LeaderboardGroup>> {
        if name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }

        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        let row = sqlx::query_as::<_, GroupRow>(
            "insert into leaderboard_groups (name, invite_code, created_by) values ($1, $2, $3) \
             on conflict (invite_code) do nothing \
             returning id, name, invite_code, created_by, created_at",
        )
        .bind(name)
        .bind(candidate_code)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(classify_db_error)?;
            return Ok(None);
        };

        sqlx::query("insert into leaderboard_group_members (group_id, user_id, role) values ($1, $2, 'admin')")
            .bind(row.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;
        Ok(Some(row_to_group(row)))
    }

    async fn join_by_code(
        &self,
        user_id: &str,
        invite_code: &str,
    ) -> AppResult<(LeaderboardGroup, JoinGroupOutcome)> {
        let upper = invite_code.trim().to_uppercase();

        let row = sqlx::query_as::<_, GroupRow>(
            "select id, name, invite_code, created_by, created_at from leaderboard_groups \
             where upper(invite_code) = $1",
        )
        .bind(&upper)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?
        .ok_or_else(|| AppError::not_found("invite code not found"))?;

        let already_member = self.is_member(row.id, user_id).await?;
        if !already_member {
            sqlx::query("insert into leaderboard_group_members (group_id, user_id, role) values ($1, $2, 'member')")
                .bind(row.id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(classify_db_error)?;
        }

        Ok((row_to_group(row), JoinGroupOutcome { already_member }))
    }

    async fn my_groups(&self, user_id: &str) -> AppResult<Vec<LeaderboardGroup>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "select g.id, g.name, g.invite_code, g.created_by, g.created_at from leaderboard_groups g \
             join leaderboard_group_members m on m.group_id = g.id where m.user_id = $1 order by g.created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(rows.into_iter().map(row_to_group).collect())
    }

    async fn is_member(&self, group_id: uuid::Uuid, user_id: &str) -> AppResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("select user_id from leaderboard_group_members where group_id = $1 and user_id = $2")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(classify_db_error)?;
        Ok(row.is_some())
    }

    async fn members(&self, group_id: uuid::Uuid) -> AppResult<Vec<LeaderboardGroupMember>> {
        let rows: Vec<(uuid::Uuid, String, String, chrono::DateTime<Utc>)> = sqlx::query_as(
            "select group_id, user_id, role, joined_at from leaderboard_group_members where group_id = $1",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;

        Ok(rows
            .into_iter()
            .map(|(group_id, user_id, role, joined_at)| LeaderboardGroupMember {
                group_id,
                user_id,
                role: if role == "admin" {
                    core::group::GroupRole::Admin
                } else {
                    core::group::GroupRole::Member
                },
                joined_at,
            })
            .collect())
    }

    async fn leave(&self, group_id: uuid::Uuid, user_id: &str) -> AppResult<()> {
        let result = sqlx::query("delete from leaderboard_group_members where group_id = $1 and user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(classify_db_error)?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("not a member of this group"));
        }
        Ok(())
    }
}
