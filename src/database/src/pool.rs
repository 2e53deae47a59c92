use std::time::Duration;

use core::error::{AppError, AppResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

/// Classify a raw sqlx/Postgres error into the infra-vs-everything-else
/// split the HTTP edge needs. Connection, timeout, TLS, auth and
/// missing-relation failures are infrastructure; everything else
/// (check constraint violations etc.) is surfaced to its caller as-is.
pub fn classify_db_error(err: sqlx::Error) -> AppError {
    let text = err.to_string().to_lowercase();
    let looks_infra = matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed)
        || text.contains("connection refused")
        || text.contains("connection reset")
        || text.contains("timeout")
        || text.contains("timed out")
        || text.contains("ssl")
        || text.contains("tls")
        || text.contains("authentication")
        || text.contains("password")
        || text.contains("does not exist")
        || text.contains("no such host");
    if looks_infra {
        AppError::infra("database unavailable")
    } else {
        AppError::infra(format!("database error: {err}"))
    }
}

/// Connects the pool, verifies connectivity, runs pending migrations
/// and ensures the `sweep_state` singleton row exists.
pub async fn connect(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .idle_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(classify_db_error)?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::infra(format!("migration failed: {e}")))?;

    sqlx::query("insert into sweep_state (id, run_count) values (1, 0) on conflict (id) do nothing")
        .execute(&pool)
        .await
        .map_err(classify_db_error)?;

    Ok(pool)
}

/// Begins a transaction on a single pooled connection. Handing the
/// caller one `Transaction` (rather than a pool reference) is what lets
/// advisory locks and `SELECT ... FOR UPDATE` compose within it, and
/// what lets completing a player's career join a transaction the sweep
/// already holds open.
pub async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin().await.map_err(classify_db_error)
}

/// Acquires a session-scoped Postgres advisory lock on `key`, blocking
/// until available, for the lifetime of `tx`. Released automatically at
/// transaction end.
pub async fn acquire_advisory_lock(tx: &mut Transaction<'_, Postgres>, key: i64) -> AppResult<()> {
    sqlx::query("select pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(classify_db_error)?;
    Ok(())
}
