pub mod auth;
pub mod error;
pub mod groups;
pub mod health;
pub mod leaderboard;
pub mod players;
pub mod seasons;
pub mod squads;
pub mod state;
pub mod sweep;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Assembles the full HTTP surface: one merged router per domain module,
/// panic containment, request tracing, and a permissive CORS policy since
/// the API is consumed cross-origin by the game client.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(players::routes())
        .merge(sweep::routes())
        .merge(seasons::routes())
        .merge(squads::routes())
        .merge(groups::routes())
        .merge(leaderboard::routes())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
