use async_trait::async_trait;
use chrono::Utc;
use core::error::{AppError, AppResult};
use core::squad::{
    CoachingSquad, FacilityType, JoinOutcome, JoinRequestStatus, MemberRole, MemberStatus, NewSquad,
    SquadJoinRequest, SquadMember, SquadPrivacy, SquadStore, sanitize_tag, squad_level, upgrade_cost,
};
use sqlx::PgPool;

use crate::pool::classify_db_error;

pub struct PgSquadStore {
    pub pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SquadRow {
    id: uuid::Uuid,
    name: String,
    tag: Option<String>,
    description: Option<String>,
    leader_user_id: String,
    privacy: String,
    total_points: i64,
    unspent_points: i64,
    level: i32,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

fn row_to_squad(r: SquadRow) -> CoachingSquad {
    CoachingSquad {
        id: r.id,
        name: r.name,
        tag: r.tag,
        description: r.description,
        leader_user_id: r.leader_user_id,
        privacy: SquadPrivacy::parse(&r.privacy).unwrap_or(SquadPrivacy::Open),
        total_points: r.total_points,
        unspent_points: r.unspent_points,
        level: r.level,
        created_at: r.created_at,
        updated_at: r.updated_at,
    }
}

const SQUAD_COLUMNS: &str = "id, name, tag, description, leader_user_id, privacy, total_points, \
    unspent_points, level, created_at, updated_at";

async fn fetch_squad_for_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    squad_id: uuid::Uuid,
) -> AppResult<SquadRow> {
    sqlx::query_as::<_, SquadRow>(&format!(
        "select {SQUAD_COLUMNS} from coaching_squads where id = $1 for update"
    ))
    .bind(squad_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(classify_db_error)?
    .ok_or_else(|| AppError::not_found("squad not found"))
}

#[async_trait]
impl SquadStore for PgSquadStore {
    async fn create_squad(&self, leader_user_id: &str, input: NewSquad) -> AppResult<CoachingSquad> {
        if self.has_active_membership(leader_user_id).await? {
            return Err(AppError::conflict("you already belong to a squad"));
        }
        if input.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        let tag = sanitize_tag(input.tag.as_deref().unwrap_or(""))?;

        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        if let Some(tag) = &tag {
            let exists: Option<(uuid::Uuid,)> =
                sqlx::query_as("select id from coaching_squads where tag = $1")
                    .bind(tag)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(classify_db_error)?;
            if exists.is_some() {
                return Err(AppError::conflict("tag already taken"));
            }
        }

        let row = sqlx::query_as::<_, SquadRow>(&format!(
            "insert into coaching_squads (name, tag, description, leader_user_id, privacy) \
             values ($1, $2, $3, $4, $5) returning {SQUAD_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&tag)
        .bind(&input.description)
        .bind(leader_user_id)
        .bind(input.privacy.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        sqlx::query(
            "insert into squad_members (squad_id, user_id, role, status) values ($1, $2, 'leader', 'active')",
        )
        .bind(row.id)
        .bind(leader_user_id)
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        for facility in FacilityType::ALL {
            sqlx::query("insert into squad_facilities (squad_id, facility_type, level) values ($1, $2, 0)")
                .bind(row.id)
                .bind(facility.as_str())
                .execute(&mut *tx)
                .await
                .map_err(classify_db_error)?;
        }

        tx.commit().await.map_err(classify_db_error)?;
        Ok(row_to_squad(row))
    }

    async fn has_active_membership(&self, user_id: &str) -> AppResult<bool> {
        let row: Option<(uuid::Uuid,)> =
            sqlx::query_as("select squad_id from squad_members where user_id = $1 and status = 'active'")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(classify_db_error)?;
        Ok(row.is_some())
    }

    async fn get_squad(&self, squad_id: uuid::Uuid) -> AppResult<Option<CoachingSquad>> {
        let row = sqlx::query_as::<_, SquadRow>(&format!(
            "select {SQUAD_COLUMNS} from coaching_squads where id = $1"
        ))
        .bind(squad_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(row.map(row_to_squad))
    }

    async fn join_open_squad(&self, user_id: &str, squad_id: uuid::Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;
        let squad = fetch_squad_for_update(&mut tx, squad_id).await?;
        if squad.privacy != "open" {
            return Err(AppError::forbidden("squad is not open"));
        }

        let already_elsewhere: Option<(uuid::Uuid,)> = sqlx::query_as(
            "select squad_id from squad_members where user_id = $1 and status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        if already_elsewhere.is_some() {
            return Err(AppError::conflict("already in a squad"));
        }

        sqlx::query(
            "insert into squad_members (squad_id, user_id, role, status) values ($1, $2, 'member', 'active') \
             on conflict (squad_id, user_id) do update set status = 'active'",
        )
        .bind(squad_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        sqlx::query("update coaching_squads set updated_at = now() where id = $1")
            .bind(squad_id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;
        Ok(())
    }

    async fn request_join(
        &self,
        user_id: &str,
        squad_id: uuid::Uuid,
    ) -> AppResult<(JoinOutcome, Option<SquadJoinRequest>)> {
        let squad = self
            .get_squad(squad_id)
            .await?
            .ok_or_else(|| AppError::not_found("squad not found"))?;

        match squad.privacy {
            SquadPrivacy::Closed => Err(AppError::forbidden("squad is closed")),
            SquadPrivacy::Open => {
                self.join_open_squad(user_id, squad_id).await?;
                Ok((JoinOutcome::Joined, None))
            }
            SquadPrivacy::Request => {
                if self.has_active_membership(user_id).await? {
                    return Err(AppError::conflict("already in a squad"));
                }

                let existing = sqlx::query_as::<_, JoinRequestRow>(
                    "select id, squad_id, user_id, status, created_at, resolved_at, resolved_by \
                     from squad_join_requests where squad_id = $1 and user_id = $2 and status = 'pending'",
                )
                .bind(squad_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(classify_db_error)?;

                if let Some(existing) = existing {
                    return Ok((JoinOutcome::RequestPending, Some(row_to_request(existing))));
                }

                let row = sqlx::query_as::<_, JoinRequestRow>(
                    "insert into squad_join_requests (squad_id, user_id) values ($1, $2) \
                     returning id, squad_id, user_id, status, created_at, resolved_at, resolved_by",
                )
                .bind(squad_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(classify_db_error)?;

                Ok((JoinOutcome::RequestPending, Some(row_to_request(row))))
            }
        }
    }

    async fn resolve_join_request(
        &self,
        request_id: uuid::Uuid,
        resolver_user_id: &str,
        approve: bool,
    ) -> AppResult<SquadJoinRequest> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        let request = sqlx::query_as::<_, JoinRequestRow>(
            "select id, squad_id, user_id, status, created_at, resolved_at, resolved_by \
             from squad_join_requests where id = $1 for update",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .ok_or_else(|| AppError::not_found("request not found"))?;

        if request.status != "pending" {
            return Err(AppError::conflict("request already resolved"));
        }

        let resolver_role = sqlx::query_as::<_, (String,)>(
            "select role from squad_members where squad_id = $1 and user_id = $2 and status = 'active'",
        )
        .bind(request.squad_id)
        .bind(resolver_user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .map(|(r,)| MemberRole::parse(&r).unwrap_or(MemberRole::Member));

        if !resolver_role.map(|r| r.can_manage()).unwrap_or(false) {
            return Err(AppError::forbidden("only the leader or co-leader may resolve requests"));
        }

        let mut approve = approve;
        let mut note: Option<&str> = None;

        if approve {
            let already_elsewhere: Option<(uuid::Uuid,)> = sqlx::query_as(
                "select squad_id from squad_members where user_id = $1 and status = 'active'",
            )
            .bind(&request.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(classify_db_error)?;

            if already_elsewhere.is_some() {
                approve = false;
                note = Some("already in a squad");
            }
        }

        let new_status = if approve { "approved" } else { "rejected" };

        let updated = sqlx::query_as::<_, JoinRequestRow>(
            "update squad_join_requests set status = $2, resolved_at = now(), resolved_by = $3 \
             where id = $1 returning id, squad_id, user_id, status, created_at, resolved_at, resolved_by",
        )
        .bind(request_id)
        .bind(new_status)
        .bind(resolver_user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        if approve {
            sqlx::query(
                "insert into squad_members (squad_id, user_id, role, status) values ($1, $2, 'member', 'active') \
                 on conflict (squad_id, user_id) do update set status = 'active'",
            )
            .bind(request.squad_id)
            .bind(&request.user_id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

            sqlx::query("update coaching_squads set updated_at = now() where id = $1")
                .bind(request.squad_id)
                .execute(&mut *tx)
                .await
                .map_err(classify_db_error)?;
        }

        tx.commit().await.map_err(classify_db_error)?;

        if let Some(note) = note {
            return Err(AppError::conflict(note));
        }

        Ok(row_to_request(updated))
    }

    async fn leave_squad(&self, user_id: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        let membership = sqlx::query_as::<_, (uuid::Uuid, String)>(
            "select squad_id, role from squad_members where user_id = $1 and status = 'active' for update",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .ok_or_else(|| AppError::not_found("no active squad membership"))?;

        let (squad_id, role) = membership;
        let role = MemberRole::parse(&role).unwrap_or(MemberRole::Member);

        if role == MemberRole::Leader {
            let remaining: Vec<(String,)> = sqlx::query_as(
                "select role from squad_members where squad_id = $1 and user_id <> $2 and status = 'active'",
            )
            .bind(squad_id)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(classify_db_error)?;

            if !remaining.is_empty()
                && !remaining
                    .iter()
                    .any(|(r,)| matches!(MemberRole::parse(r), Some(MemberRole::CoLeader) | Some(MemberRole::Leader)))
            {
                return Err(AppError::conflict(
                    "promote a co-leader before leaving as the only leader",
                ));
            }
        }

        sqlx::query("update squad_members set status = 'inactive' where squad_id = $1 and user_id = $2")
            .bind(squad_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;
        Ok(())
    }

    async fn upgrade_facility(
        &self,
        user_id: &str,
        squad_id: uuid::Uuid,
        facility: FacilityType,
    ) -> AppResult<CoachingSquad> {
        let mut tx = self.pool.begin().await.map_err(classify_db_error)?;

        let role = sqlx::query_as::<_, (String,)>(
            "select role from squad_members where squad_id = $1 and user_id = $2 and status = 'active'",
        )
        .bind(squad_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify_db_error)?
        .map(|(r,)| MemberRole::parse(&r).unwrap_or(MemberRole::Member));

        if !role.map(|r| r.can_manage()).unwrap_or(false) {
            return Err(AppError::forbidden("only the leader or co-leader may upgrade facilities"));
        }

        let squad = fetch_squad_for_update(&mut tx, squad_id).await?;

        let (level,): (i32,) = sqlx::query_as(
            "select level from squad_facilities where squad_id = $1 and facility_type = $2 for update",
        )
        .bind(squad_id)
        .bind(facility.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        let cost = upgrade_cost(facility, level);
        if squad.unspent_points < cost {
            return Err(AppError::conflict("insufficient points"));
        }

        sqlx::query("update squad_facilities set level = level + 1 where squad_id = $1 and facility_type = $2")
            .bind(squad_id)
            .bind(facility.as_str())
            .execute(&mut *tx)
            .await
            .map_err(classify_db_error)?;

        let levels: Vec<(i32,)> = sqlx::query_as("select level from squad_facilities where squad_id = $1")
            .bind(squad_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(classify_db_error)?;
        let new_level = squad_level(&levels.iter().map(|(l,)| *l).collect::<Vec<_>>());

        let updated = sqlx::query_as::<_, SquadRow>(&format!(
            "update coaching_squads set unspent_points = unspent_points - $2, level = $3, updated_at = now() \
             where id = $1 returning {SQUAD_COLUMNS}"
        ))
        .bind(squad_id)
        .bind(cost)
        .bind(new_level)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        sqlx::query(
            "insert into squad_spend_transactions (squad_id, user_id, facility_type, cost) values ($1, $2, $3, $4)",
        )
        .bind(squad_id)
        .bind(user_id)
        .bind(facility.as_str())
        .bind(cost)
        .execute(&mut *tx)
        .await
        .map_err(classify_db_error)?;

        tx.commit().await.map_err(classify_db_error)?;
        Ok(row_to_squad(updated))
    }

    async fn set_member_role(
        &self,
        leader_user_id: &str,
        squad_id: uuid::Uuid,
        target_user_id: &str,
        role: MemberRole,
    ) -> AppResult<()> {
        if !role.is_assignable() {
            return Err(AppError::validation("role must be co_leader or member"));
        }

        let squad = self
            .get_squad(squad_id)
            .await?
            .ok_or_else(|| AppError::not_found("squad not found"))?;
        if squad.leader_user_id != leader_user_id {
            return Err(AppError::forbidden("only the current leader may set roles"));
        }

        let result = sqlx::query(
            "update squad_members set role = $3 where squad_id = $1 and user_id = $2 and status = 'active'",
        )
        .bind(squad_id)
        .bind(target_user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(classify_db_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("target is not an active member"));
        }
        Ok(())
    }

    async fn leaderboard(&self, limit: i64) -> AppResult<Vec<CoachingSquad>> {
        let rows = sqlx::query_as::<_, SquadRow>(&format!(
            "select {SQUAD_COLUMNS} from coaching_squads \
             order by total_points desc, level desc, updated_at asc limit $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(rows.into_iter().map(row_to_squad).collect())
    }

    async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<CoachingSquad>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let rows = sqlx::query_as::<_, SquadRow>(&format!(
            "select {SQUAD_COLUMNS} from coaching_squads \
             where lower(name) like $1 or lower(coalesce(tag, '')) like $1 \
             order by total_points desc limit $2"
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(rows.into_iter().map(row_to_squad).collect())
    }

    async fn my_squad(&self, user_id: &str) -> AppResult<Option<(CoachingSquad, SquadMember)>> {
        let member_row = sqlx::query_as::<_, (uuid::Uuid, String, i64, String, chrono::DateTime<Utc>)>(
            "select squad_id, role, points_contributed, status, joined_at \
             from squad_members where user_id = $1 and status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify_db_error)?;

        let Some((squad_id, role, points_contributed, status, joined_at)) = member_row else {
            return Ok(None);
        };

        let squad = self
            .get_squad(squad_id)
            .await?
            .ok_or_else(|| AppError::infra("squad referenced by membership is missing"))?;

        Ok(Some((
            squad,
            SquadMember {
                squad_id,
                user_id: user_id.to_string(),
                role: MemberRole::parse(&role).unwrap_or(MemberRole::Member),
                points_contributed,
                status: if status == "active" {
                    MemberStatus::Active
                } else {
                    MemberStatus::Inactive
                },
                joined_at,
            },
        )))
    }

    async fn pending_requests(&self, squad_id: uuid::Uuid) -> AppResult<Vec<SquadJoinRequest>> {
        let rows = sqlx::query_as::<_, JoinRequestRow>(
            "select id, squad_id, user_id, status, created_at, resolved_at, resolved_by \
             from squad_join_requests where squad_id = $1 and status = 'pending' order by created_at",
        )
        .bind(squad_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify_db_error)?;
        Ok(rows.into_iter().map(row_to_request).collect())
    }
}

#[derive(sqlx::FromRow)]
struct JoinRequestRow {
    id: uuid::Uuid,
    squad_id: uuid::Uuid,
    user_id: String,
    status: String,
    created_at: chrono::DateTime<Utc>,
    resolved_at: Option<chrono::DateTime<Utc>>,
    resolved_by: Option<String>,
}

fn row_to_request(r: JoinRequestRow) -> SquadJoinRequest {
    SquadJoinRequest {
        id: r.id,
        squad_id: r.squad_id,
        user_id: r.user_id,
        status: match r.status.as_str() {
            "approved" => JoinRequestStatus::Approved,
            "rejected" => JoinRequestStatus::Rejected,
            _ => JoinRequestStatus::Pending,
        },
        created_at: r.created_at,
        resolved_at: r.resolved_at,
        resolved_by: r.resolved_by,
    }
}
