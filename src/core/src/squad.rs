use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquadPrivacy {
    Open,
    Request,
    Closed,
}

impl SquadPrivacy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SquadPrivacy::Open),
            "request" => Some(SquadPrivacy::Request),
            "closed" => Some(SquadPrivacy::Closed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SquadPrivacy::Open => "open",
            SquadPrivacy::Request => "request",
            SquadPrivacy::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Leader,
    CoLeader,
    Member,
}

impl MemberRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "leader" => Some(MemberRole::Leader),
            "co_leader" => Some(MemberRole::CoLeader),
            "member" => Some(MemberRole::Member),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Leader => "leader",
            MemberRole::CoLeader => "co_leader",
            MemberRole::Member => "member",
        }
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, MemberRole::Leader | MemberRole::CoLeader)
    }

    /// Roles a leader may hand out via `setMemberRole`.
    /// `leader` itself is excluded — leadership transfer isn't this op.
    pub fn is_assignable(&self) -> bool {
        matches!(self, MemberRole::CoLeader | MemberRole::Member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    TrainingEquipment,
    Spa,
    AnalysisRoom,
    MedicalCenter,
}

impl FacilityType {
    pub const ALL: [FacilityType; 4] = [
        FacilityType::TrainingEquipment,
        FacilityType::Spa,
        FacilityType::AnalysisRoom,
        FacilityType::MedicalCenter,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "training_equipment" => Some(FacilityType::TrainingEquipment),
            "spa" => Some(FacilityType::Spa),
            "analysis_room" => Some(FacilityType::AnalysisRoom),
            "medical_center" => Some(FacilityType::MedicalCenter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::TrainingEquipment => "training_equipment",
            FacilityType::Spa => "spa",
            FacilityType::AnalysisRoom => "analysis_room",
            FacilityType::MedicalCenter => "medical_center",
        }
    }

    pub fn base_cost(&self) -> i64 {
        match self {
            FacilityType::TrainingEquipment => 5,
            FacilityType::Spa => 8,
            FacilityType::AnalysisRoom => 6,
            FacilityType::MedicalCenter => 7,
        }
    }
}

/// `cost = base_cost[type] * (current_level + 1)`.
pub fn upgrade_cost(facility: FacilityType, current_level: i32) -> i64 {
    facility.base_cost() * i64::from(current_level + 1)
}

/// `level = 1 + floor(sum(facility levels) / 4)`.
pub fn squad_level(facility_levels: &[i32]) -> i32 {
    1 + facility_levels.iter().sum::<i32>() / 4
}

/// Uppercase-alphanumeric, 2-5 chars.
pub fn sanitize_tag(raw: &str) -> AppResult<Option<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let upper = trimmed.to_uppercase();
    if !(2..=5).contains(&upper.len()) || !upper.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::validation(
            "tag must be 2-5 uppercase alphanumeric characters",
        ));
    }
    Ok(Some(upper))
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachingSquad {
    pub id: uuid::Uuid,
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
    pub leader_user_id: String,
    pub privacy: SquadPrivacy,
    pub total_points: i64,
    pub unspent_points: i64,
    pub level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadMember {
    pub squad_id: uuid::Uuid,
    pub user_id: String,
    pub role: MemberRole,
    pub points_contributed: i64,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct SquadJoinRequest {
    pub id: uuid::Uuid,
    pub squad_id: uuid::Uuid,
    pub user_id: String,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSquad {
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
    pub privacy: SquadPrivacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    RequestPending,
}

/// Port for squad persistence. Row locking (`SELECT ... FOR UPDATE`
/// on the squad, the facility, or the join request) is the Postgres
/// implementation's responsibility; this trait exposes only the
/// operation boundary.
#[async_trait]
pub trait SquadStore: Send + Sync {
    async fn create_squad(&self, leader_user_id: &str, input: NewSquad) -> AppResult<CoachingSquad>;
    async fn has_active_membership(&self, user_id: &str) -> AppResult<bool>;
    async fn get_squad(&self, squad_id: uuid::Uuid) -> AppResult<Option<CoachingSquad>>;
    async fn join_open_squad(&self, user_id: &str, squad_id: uuid::Uuid) -> AppResult<()>;
    async fn request_join(
        &self,
        user_id: &str,
        squad_id: uuid::Uuid,
    ) -> AppResult<(JoinOutcome, Option<SquadJoinRequest>)>;
    async fn resolve_join_request(
        &self,
        request_id: uuid::Uuid,
        resolver_user_id: &str,
        approve: bool,
    ) -> AppResult<SquadJoinRequest>;
    async fn leave_squad(&self, user_id: &str) -> AppResult<()>;
    async fn upgrade_facility(
        &self,
        user_id: &str,
        squad_id: uuid::Uuid,
        facility: FacilityType,
    ) -> AppResult<CoachingSquad>;
    async fn set_member_role(
        &self,
        leader_user_id: &str,
        squad_id: uuid::Uuid,
        target_user_id: &str,
        role: MemberRole,
    ) -> AppResult<()>;
    async fn leaderboard(&self, limit: i64) -> AppResult<Vec<CoachingSquad>>;
    async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<CoachingSquad>>;
    async fn my_squad(&self, user_id: &str) -> AppResult<Option<(CoachingSquad, SquadMember)>>;
    async fn pending_requests(&self, squad_id: uuid::Uuid) -> AppResult<Vec<SquadJoinRequest>>;
}
