use std::sync::Arc;

use common::{
    error::AppError,
    file_search::FileSearchService,
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::config::AppConfig,
};
use ingestion_pipeline::{IndexingPipeline, IndexingTuning};
use retrieval_pipeline::StoreRegistry;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub file_search: Arc<dyn FileSearchService>,
    pub registry: Arc<StoreRegistry>,
    pub pipeline: Arc<IndexingPipeline>,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
        file_search: Arc<dyn FileSearchService>,
    ) -> Result<Self, AppError> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.ensure_initialized().await?;

        Ok(Self::with_components(
            surreal_db_client,
            config.clone(),
            storage,
            file_search,
        ))
    }

    /// Wires the registry and pipeline around already-built collaborators.
    pub fn with_components(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        storage: StorageManager,
        file_search: Arc<dyn FileSearchService>,
    ) -> Self {
        let registry = Arc::new(StoreRegistry::new(
            Arc::clone(&db),
            Arc::clone(&file_search),
            config.file_search_store_name.clone(),
        ));
        let pipeline = Arc::new(IndexingPipeline::new(
            Arc::clone(&db),
            storage.clone(),
            Arc::clone(&file_search),
            Arc::clone(&registry),
            IndexingTuning::from_app_config(&config),
        ));

        Self {
            db,
            config,
            storage,
            file_search,
            registry,
            pipeline,
        }
    }
}
