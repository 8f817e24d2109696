use std::sync::Arc;

use common::{
    error::AppError,
    file_search::FileSearchService,
    storage::{db::SurrealDbClient, types::store_registration::StoreRegistration},
};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Resolves the single shared file search store, creating it on first use.
///
/// The persisted [`StoreRegistration`] is the source of truth; the cell only
/// caches it. Concurrent first callers are serialized by the cell so at most one
/// of them reaches the service.
pub struct StoreRegistry {
    db: Arc<SurrealDbClient>,
    service: Arc<dyn FileSearchService>,
    display_name: String,
    handle: OnceCell<String>,
}

impl StoreRegistry {
    pub fn new(
        db: Arc<SurrealDbClient>,
        service: Arc<dyn FileSearchService>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            db,
            service,
            display_name: display_name.into(),
            handle: OnceCell::new(),
        }
    }

    /// The cached handle, if a previous call already resolved it.
    pub fn cached(&self) -> Option<&str> {
        self.handle.get().map(String::as_str)
    }

    pub async fn get_or_create_store(&self) -> Result<String, AppError> {
        self.handle
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }

    async fn load_or_create(&self) -> Result<String, AppError> {
        if let Some(registration) = StoreRegistration::get_current(&self.db).await? {
            info!(store_handle = %registration.store_handle, "using registered file search store");
            return Ok(registration.store_handle);
        }

        let handle = self
            .service
            .create_store(&self.display_name)
            .await
            .map_err(|err| err.context("create file search store"))?;
        if handle.trim().is_empty() {
            return Err(AppError::Config(
                "file search service returned an empty store handle".into(),
            ));
        }

        match StoreRegistration::new(handle.clone(), self.display_name.clone())
            .persist(&self.db)
            .await
        {
            Ok(_) => {
                info!(store_handle = %handle, display_name = %self.display_name, "registered new file search store");
                Ok(handle)
            }
            Err(err) => {
                // Another process won the registration race.
                if let Some(existing) = StoreRegistration::get_current(&self.db).await? {
                    warn!(
                        orphaned_store = %handle,
                        store_handle = %existing.store_handle,
                        "store registered concurrently; discarding newly created store"
                    );
                    return Ok(existing.store_handle);
                }
                Err(err)
            }
        }
    }
}
