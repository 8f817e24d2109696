use std::time::Duration;

use common::utils::config::{
    default_indexing_max_poll_attempts, default_indexing_poll_interval_secs, AppConfig,
};

/// Poll cadence for the indexing operation.
///
/// The worst-case wait is `poll_interval * max_poll_attempts`.
#[derive(Debug, Clone)]
pub struct IndexingTuning {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for IndexingTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(default_indexing_poll_interval_secs()),
            max_poll_attempts: default_indexing_max_poll_attempts(),
        }
    }
}

impl IndexingTuning {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.indexing_poll_interval_secs),
            max_poll_attempts: config.indexing_max_poll_attempts.max(1),
        }
    }

    pub fn max_wait(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_poll_attempts)
    }
}
