//! Registry of running queues, keyed by queue URL

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::actor::QueueHandle;
use crate::clock::{Clock, SystemClock};
use crate::queue::{QueueConfig, QueueStore};

/// Settings used to derive queue URLs and ARNs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Base URL clients reach the broker at, without a trailing slash
    pub endpoint: String,
    pub account_id: String,
    pub region: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4566".to_string(),
            account_id: "000000000000".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Concurrent map from queue URL to the actor serving that queue.
///
/// Only identity resolution is guarded here; operations on different queues
/// proceed independently inside their own actors.
#[derive(Debug)]
pub struct QueueRegistry {
    queues: DashMap<String, QueueHandle>,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl QueueRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            queues: DashMap::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn queue_url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.account_id,
            name
        )
    }

    pub fn queue_arn(&self, name: &str) -> String {
        format!(
            "arn:aws:sqs:{}:{}:{}",
            self.config.region, self.config.account_id, name
        )
    }

    pub fn resolve(&self, url: &str) -> Option<QueueHandle> {
        self.queues.get(url).map(|q| q.value().clone())
    }

    /// Linear scan; names are unique because URLs are derived from them.
    pub fn find_by_name(&self, name: &str) -> Option<(QueueHandle, String)> {
        self.queues
            .iter()
            .find(|q| q.value().name() == name)
            .map(|q| (q.value().clone(), q.key().clone()))
    }

    /// Return the queue called `name`, creating it with defaults if absent.
    pub fn create_if_absent(&self, name: &str) -> (QueueHandle, String) {
        self.create_if_absent_with(name, QueueConfig::default())
    }

    /// Like [`create_if_absent`](Self::create_if_absent), but a newly created
    /// queue starts with `config`. An existing queue keeps its configuration.
    pub fn create_if_absent_with(&self, name: &str, config: QueueConfig) -> (QueueHandle, String) {
        let url = self.queue_url(name);
        let handle = self
            .queues
            .entry(url.clone())
            .or_insert_with(|| {
                info!(name = %name, url = %url, "Creating queue");
                let store = QueueStore::new(name, self.queue_arn(name), config, self.clock.now());
                QueueHandle::spawn(store, url.clone(), self.clock.clone())
            })
            .value()
            .clone();
        (handle, url)
    }

    /// Unregister the queue and stop its actor. Returns false for an unknown URL.
    pub fn delete(&self, url: &str) -> bool {
        match self.queues.remove(url) {
            Some((_, handle)) => {
                info!(name = %handle.name(), url = %url, "Deleting queue");
                handle.shutdown();
                true
            }
            None => false,
        }
    }

    /// Snapshot of every registered queue URL, in no particular order
    pub fn list_all(&self) -> Vec<String> {
        self.list(None)
    }

    pub fn list(&self, name_prefix: Option<&str>) -> Vec<String> {
        self.queues
            .iter()
            .filter(|q| match name_prefix {
                Some(prefix) => q.value().name().starts_with(prefix),
                None => true,
            })
            .map(|q| q.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
