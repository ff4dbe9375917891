use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;

pub struct AppState {
    pub conn: DbPool,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: DbPool, identity: Arc<dyn IdentityProvider>, config: AppConfig) -> Self {
        Self {
            conn,
            identity,
            config,
        }
    }
}
