use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::error::AppResult;

const INVITE_CODE_LEN: usize = 6;
const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const MAX_INVITE_CODE_ATTEMPTS: u32 = 5;

/// A random 6-char uppercase-alphanumeric invite code. Collisions are
/// handled by the caller retrying up to five times.
pub fn generate_invite_code(rng: &mut impl Rng) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..INVITE_CODE_ALPHABET.len());
            INVITE_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardGroup {
    pub id: uuid::Uuid,
    pub name: String,
    pub invite_code: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardGroupMember {
    pub group_id: uuid::Uuid,
    pub user_id: String,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinGroupOutcome {
    pub already_member: bool,
}

/// Port for friend-group persistence. `create_group` receives a
/// caller-generated candidate code and reports whether it collided so
/// the caller can retry with a fresh one.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn try_create_group(
        &self,
        user_id: &str,
        name: &str,
        candidate_code: &str,
    ) -> AppResult<Option<LeaderboardGroup>>;
    async fn join_by_code(
        &self,
        user_id: &str,
        invite_code: &str,
    ) -> AppResult<(LeaderboardGroup, JoinGroupOutcome)>;
    async fn my_groups(&self, user_id: &str) -> AppResult<Vec<LeaderboardGroup>>;
    async fn is_member(&self, group_id: uuid::Uuid, user_id: &str) -> AppResult<bool>;
    async fn members(&self, group_id: uuid::Uuid) -> AppResult<Vec<LeaderboardGroupMember>>;
    async fn leave(&self, group_id: uuid::Uuid, user_id: &str) -> AppResult<()>;
}
