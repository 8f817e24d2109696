use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
    S3,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub http_port: u16,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    /// Left optional so a missing key only fails the first retrieval call.
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_file_search_store_name")]
    pub file_search_store_name: String,
    #[serde(default = "default_indexing_poll_interval_secs")]
    pub indexing_poll_interval_secs: u64,
    #[serde(default = "default_indexing_max_poll_attempts")]
    pub indexing_max_poll_attempts: u32,
    #[serde(default = "default_signed_url_ttl_minutes")]
    pub signed_url_ttl_minutes: u64,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_file_search_store_name() -> String {
    "policy-documents".to_string()
}

pub const fn default_indexing_poll_interval_secs() -> u64 {
    5
}

pub const fn default_indexing_max_poll_attempts() -> u32 {
    60
}

const fn default_signed_url_ttl_minutes() -> u64 {
    60
}

const fn default_ingest_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "policydesk".to_string(),
            surrealdb_database: "policydesk".to_string(),
            data_dir: default_data_dir(),
            http_port: 0,
            storage: default_storage_kind(),
            s3_bucket: None,
            s3_region: None,
            gemini_api_key: None,
            gemini_base_url: default_gemini_base_url(),
            gemini_model: default_gemini_model(),
            file_search_store_name: default_file_search_store_name(),
            indexing_poll_interval_secs: default_indexing_poll_interval_secs(),
            indexing_max_poll_attempts: default_indexing_max_poll_attempts(),
            signed_url_ttl_minutes: default_signed_url_ttl_minutes(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
