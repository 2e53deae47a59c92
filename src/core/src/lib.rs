pub mod error;
pub mod group;
pub mod leaderboard;
pub mod player;
pub mod season;
pub mod squad;
pub mod sweep;
#[cfg(test)]
mod test_support;
pub mod time_util;

pub use error::{AppError, AppResult};
