pub mod group_store;
pub mod leaderboard_store;
pub mod player_store;
pub mod pool;
pub mod season_store;
pub mod squad_store;
pub mod sweep_store;

use core::error::AppResult;
use sqlx::PgPool;

pub use group_store::PgGroupStore;
pub use leaderboard_store::PgLeaderboardStore;
pub use player_store::PgPlayerStore;
pub use season_store::PgSeasonStore;
pub use squad_store::PgSquadStore;
pub use sweep_store::PgSweepStore;

/// Owns the connection pool and hands out the per-domain store
/// implementations that ride on it.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = pool::connect(database_url).await?;
        Ok(Database { pool })
    }

    pub fn players(&self) -> PgPlayerStore {
        PgPlayerStore { pool: self.pool.clone() }
    }

    pub fn sweep(&self) -> PgSweepStore {
        PgSweepStore { pool: self.pool.clone() }
    }

    pub fn seasons(&self) -> PgSeasonStore {
        PgSeasonStore { pool: self.pool.clone() }
    }

    pub fn squads(&self) -> PgSquadStore {
        PgSquadStore { pool: self.pool.clone() }
    }

    pub fn groups(&self) -> PgGroupStore {
        PgGroupStore { pool: self.pool.clone() }
    }

    pub fn leaderboard(&self) -> PgLeaderboardStore {
        PgLeaderboardStore { pool: self.pool.clone() }
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("select 1").execute(&self.pool).await.is_ok()
    }
}
