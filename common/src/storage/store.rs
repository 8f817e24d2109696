use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::signer::Signer;
use object_store::{
    path::Path as ObjPath, Attribute, AttributeValue, Attributes, ObjectStore, PutOptions,
};
use tracing::debug;
use url::Url;

use crate::error::AppError;
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Location of a freshly written object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub uri: String,
    pub blob_name: String,
}

/// Storage manager wrapping the configured `object_store` backend.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    signer: Option<Arc<dyn Signer>>,
    backend_kind: StorageKind,
    uri_base: String,
}

impl StorageManager {
    /// Create a new StorageManager with the specified configuration.
    pub async fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        match cfg.storage {
            StorageKind::Local => {
                let base = resolve_base_dir(cfg);
                if !base.exists() {
                    tokio::fs::create_dir_all(&base).await?;
                }
                let store = LocalFileSystem::new_with_prefix(base.clone())?;
                Ok(Self {
                    store: Arc::new(store),
                    signer: None,
                    backend_kind: StorageKind::Local,
                    uri_base: format!("file://{}", base.display()),
                })
            }
            StorageKind::Memory => Ok(Self::with_backend(
                Arc::new(InMemory::new()),
                StorageKind::Memory,
            )),
            StorageKind::S3 => {
                let bucket = cfg.s3_bucket.as_deref().ok_or_else(|| {
                    AppError::Config("s3_bucket is required for the s3 storage backend".into())
                })?;
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = cfg.s3_region.as_deref() {
                    builder = builder.with_region(region);
                }
                let s3 = Arc::new(builder.build()?);
                Ok(Self {
                    store: Arc::clone(&s3) as DynStore,
                    signer: Some(s3 as Arc<dyn Signer>),
                    backend_kind: StorageKind::S3,
                    uri_base: format!("s3://{bucket}"),
                })
            }
        }
    }

    /// Create a StorageManager with a custom storage backend.
    ///
    /// Injected backends never issue signed URLs.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            signer: None,
            backend_kind,
            uri_base: "memory://".to_string(),
        }
    }

    /// Get the storage backend kind.
    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Store bytes under `name`, tagging them with content type and metadata.
    pub async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
        metadata: &[(&str, &str)],
    ) -> Result<StoredBlob, AppError> {
        let path = ObjPath::from(name);
        let payload = object_store::PutPayload::from_bytes(data);

        // The local filesystem backend rejects object attributes.
        let options = if matches!(self.backend_kind, StorageKind::Local) {
            PutOptions::default()
        } else {
            let mut attributes = Attributes::new();
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
            for (key, value) in metadata {
                attributes.insert(
                    Attribute::Metadata((*key).to_string().into()),
                    AttributeValue::from((*value).to_string()),
                );
            }
            PutOptions {
                attributes,
                ..PutOptions::default()
            }
        };

        self.store.put_opts(&path, payload, options).await?;

        Ok(StoredBlob {
            uri: format!("{}/{}", self.uri_base, path),
            blob_name: path.to_string(),
        })
    }

    /// Retrieve bytes from the specified location.
    ///
    /// Returns the full contents buffered in memory.
    pub async fn get(&self, name: &str) -> Result<Bytes, AppError> {
        let path = ObjPath::from(name);
        let result = self.store.get(&path).await.map_err(|err| match err {
            object_store::Error::NotFound { .. } => AppError::NotFound(format!("blob {name}")),
            other => AppError::ObjectStore(other),
        })?;
        Ok(result.bytes().await?)
    }

    /// Get a streaming handle for large objects.
    pub async fn get_stream(
        &self,
        name: &str,
    ) -> Result<BoxStream<'static, object_store::Result<Bytes>>, AppError> {
        let path = ObjPath::from(name);
        let result = self.store.get(&path).await.map_err(|err| match err {
            object_store::Error::NotFound { .. } => AppError::NotFound(format!("blob {name}")),
            other => AppError::ObjectStore(other),
        })?;
        Ok(result.into_stream())
    }

    /// Delete the object at `name`. Deleting a missing object succeeds.
    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        let path = ObjPath::from(name);
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                debug!(blob_name = %name, "blob already absent on delete");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, name: &str) -> Result<bool, AppError> {
        let path = ObjPath::from(name);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// List all objects below the specified prefix.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<object_store::ObjectMeta>, AppError> {
        let prefix_path = prefix.map(ObjPath::from);
        Ok(self.store.list(prefix_path.as_ref()).try_collect().await?)
    }

    /// Issue a time-limited GET URL for the object at `name`.
    ///
    /// Only signing-capable backends (S3) support this.
    pub async fn signed_url(&self, name: &str, ttl_minutes: u64) -> Result<Url, AppError> {
        let Some(signer) = &self.signer else {
            return Err(AppError::Validation(format!(
                "the {:?} storage backend cannot issue signed URLs",
                self.backend_kind
            )));
        };
        let path = ObjPath::from(name);
        let expires_in = Duration::from_secs(ttl_minutes.saturating_mul(60));
        Ok(signer
            .signed_url(reqwest::Method::GET, &path, expires_in)
            .await?)
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config_memory() -> AppConfig {
        AppConfig {
            storage: StorageKind::Memory,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_storage_manager_memory_basic_operations() {
        let storage = StorageManager::new(&test_config_memory())
            .await
            .expect("create storage manager");

        let data = b"test data for storage manager";
        let blob = storage
            .put(
                "documents/1-handbook.pdf",
                Bytes::from(data.to_vec()),
                "application/pdf",
                &[("title", "Employee Handbook")],
            )
            .await
            .expect("put");
        assert_eq!(blob.blob_name, "documents/1-handbook.pdf");
        assert_eq!(blob.uri, "memory:///documents/1-handbook.pdf");

        let retrieved = storage.get(&blob.blob_name).await.expect("get");
        assert_eq!(retrieved.as_ref(), data);
        assert!(storage.exists(&blob.blob_name).await.expect("exists check"));

        storage.delete(&blob.blob_name).await.expect("delete");
        assert!(!storage
            .exists(&blob.blob_name)
            .await
            .expect("exists check after delete"));
    }

    #[tokio::test]
    async fn test_storage_manager_local_basic_operations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfig {
            storage: StorageKind::Local,
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let storage = StorageManager::new(&cfg)
            .await
            .expect("create storage manager");

        let blob = storage
            .put(
                "documents/2-policy.txt",
                Bytes::from_static(b"local bytes"),
                "text/plain",
                &[("title", "Policy")],
            )
            .await
            .expect("put");
        assert!(blob.uri.starts_with("file://"));
        assert!(dir.path().join("documents/2-policy.txt").exists());

        let retrieved = storage.get(&blob.blob_name).await.expect("get");
        assert_eq!(retrieved.as_ref(), b"local bytes");

        storage.delete(&blob.blob_name).await.expect("delete");
        assert!(!dir.path().join("documents/2-policy.txt").exists());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let storage = StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory);
        storage
            .delete("documents/never-written.pdf")
            .await
            .expect("deleting a missing blob succeeds");
        storage
            .delete("documents/never-written.pdf")
            .await
            .expect("and again");
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let storage = StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory);
        let err = storage.get("nope.pdf").await.expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let storage = StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory);
        for name in ["documents/a.pdf", "documents/b.pdf", "other/c.txt"] {
            storage
                .put(name, Bytes::from_static(b"x"), "application/octet-stream", &[])
                .await
                .expect("put");
        }
        assert_eq!(storage.list(None).await.expect("list all").len(), 3);
        assert_eq!(
            storage
                .list(Some("documents"))
                .await
                .expect("list prefix")
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn unsigned_backends_refuse_signed_urls() {
        let storage = StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory);
        let err = storage
            .signed_url("documents/a.pdf", 60)
            .await
            .expect_err("memory backend cannot sign");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn s3_backend_requires_bucket() {
        let cfg = AppConfig {
            storage: StorageKind::S3,
            ..Default::default()
        };
        let err = StorageManager::new(&cfg)
            .await
            .err()
            .expect("missing bucket must fail");
        assert!(matches!(err, AppError::Config(_)));
    }
}
