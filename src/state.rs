use crate::config::AppConfig;
use crate::shirts::repo::{PgShirtStore, ShirtStore};
use crate::storage::{LocalStorage, StorageClient};
use crate::users::repo::{PgUserStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub shirts: Arc<dyn ShirtStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = crate::db::connect(&config).await?;
        crate::db::migrate(&db).await?;

        let storage = Arc::new(LocalStorage::new(&config.media.root).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgShirtStore::new(db)),
            storage,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        shirts: Arc<dyn ShirtStore>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            shirts,
            storage,
        }
    }
}
