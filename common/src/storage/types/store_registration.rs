use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Fixed record key of the single shared file search store.
pub const DEFAULT_STORE_KEY: &str = "default";

stored_object!(StoreRegistration, "file_search_store", {
    store_handle: String,
    display_name: String
});

impl StoreRegistration {
    pub fn new(store_handle: String, display_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: DEFAULT_STORE_KEY.to_string(),
            created_at: now,
            updated_at: now,
            store_handle,
            display_name,
        }
    }

    pub async fn get_current(db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        Ok(db.get_item::<Self>(DEFAULT_STORE_KEY).await?)
    }

    /// Persists the registration under the fixed key.
    ///
    /// Fails if another process registered a store first; the caller should
    /// then re-read [`StoreRegistration::get_current`].
    pub async fn persist(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        let created = db.store_item(self).await?;
        created.ok_or_else(|| {
            AppError::InternalError("store registration was not returned on create".into())
        })
    }
}
