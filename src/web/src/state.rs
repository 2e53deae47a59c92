use std::sync::Arc;

use database::Database;

#[derive(Clone)]
pub struct AppState(Arc<AppStateInner>);

pub struct AppStateInner {
    pub database: Database,
    pub jwt_secret: Option<String>,
    pub hmac_secret: Option<String>,
    pub cron_secret: Option<String>,
    pub is_production: bool,
}

impl AppState {
    pub fn new(
        database: Database,
        jwt_secret: Option<String>,
        hmac_secret: Option<String>,
        cron_secret: Option<String>,
        is_production: bool,
    ) -> Self {
        AppState(Arc::new(AppStateInner {
            database,
            jwt_secret,
            hmac_secret,
            cron_secret,
            is_production,
        }))
    }
}

impl std::ops::Deref for AppState {
    type Target = AppStateInner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
