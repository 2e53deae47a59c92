use std::env;

use database::Database;
use env_logger::Env;
use log::info;
use web::{AppState, app};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct Config {
    database_url: String,
    port: u16,
    jwt_secret: Option<String>,
    hmac_secret: Option<String>,
    cron_secret: Option<String>,
    is_production: bool,
}

impl Config {
    fn from_env() -> Self {
        Config {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080),
            jwt_secret: env::var("AUTH_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            hmac_secret: env::var("BRAIN_HMAC_SECRET").ok().filter(|s| !s.is_empty()),
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            is_production: env::var("NODE_ENV").map(|v| v == "production").unwrap_or(false),
        }
    }
}

#[tokio::main]
async fn main() {
    color_eyre::install().unwrap();

    if !matches!(env::var("NODE_ENV").as_deref(), Ok("production")) {
        dotenvy::dotenv().ok();
    }

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env();

    if config.jwt_secret.is_none() {
        log::warn!("AUTH_JWT_SECRET is not set; the user-JWT gate will fail closed");
    }
    if config.hmac_secret.is_none() {
        log::warn!("BRAIN_HMAC_SECRET is not set; the server-HMAC gate will fail closed");
    }
    if config.cron_secret.is_none() {
        log::warn!("CRON_SECRET is not set; the cron gate will fail closed");
    }

    let database = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to the database");

    info!("database connected and migrations applied");

    let state = AppState::new(
        database,
        config.jwt_secret,
        config.hmac_secret,
        config.cron_secret,
        config.is_production,
    );

    let router = app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    info!("brain listening on {addr}");

    axum::serve(listener, router).await.expect("server error");
}
