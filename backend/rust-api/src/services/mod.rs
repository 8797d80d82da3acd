use std::sync::Arc;

use mongodb::Client as MongoClient;

use crate::config::Config;
use crate::repository::{MongoStore, Store};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        tracing::info!(
            database = %config.database.mongo_database,
            "Preparing MongoDB collections"
        );
        let store = MongoStore::connect(mongo_client, &config.database.mongo_database).await?;
        tracing::info!("MongoDB store ready");

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// State over an already built store, e.g. `InMemoryStore` in tests.
    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }
}

pub mod answer_validator;
pub mod auth_service;
pub mod authorization_service;
pub mod dashboard_service;
pub mod draft_service;
pub mod form_service;
pub mod participation_service;
pub mod progress;
pub mod submission_service;
