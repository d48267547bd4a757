use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::drive::ObjectStore;

pub struct AppState {
    pub conn: DbPool,
    pub drive: ObjectStore,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(conn: DbPool, drive: ObjectStore, config: AppConfig) -> Self {
        Self {
            conn,
            drive,
            config,
        }
    }
}
