//! Client configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use turbo_cache::{Backends, FileStore, MemoryStore, SafeSerializer, DEFAULT_QUOTA_BYTES};
use turbo_commerce::Catalog;
use turbo_data::{HttpReconciliationClient, Transport};

/// Client configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Largest avatar payload cached inline, in bytes.
    #[serde(default = "default_avatar_limit")]
    pub avatar_limit_bytes: usize,

    /// Storage backends.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Profile and favorites service.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Price table override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Catalog>,
}

fn default_avatar_limit() -> usize {
    SafeSerializer::DEFAULT_PAYLOAD_LIMIT
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            avatar_limit_bytes: default_avatar_limit(),
            storage: StorageConfig::default(),
            remote: RemoteConfig::default(),
            catalog: None,
        }
    }
}

impl ClientConfig {
    /// Load config from a file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &str) -> Result<()> {
        let content = if path.ends_with(".json") {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))
    }

    /// Serializer bounding avatars to `avatar_limit_bytes`.
    pub fn serializer(&self) -> SafeSerializer {
        SafeSerializer::new(self.avatar_limit_bytes)
    }

    /// Open both storage backends.
    ///
    /// Without a `durable_dir` the durable backend lives in memory.
    pub fn open_backends(&self) -> Result<Backends> {
        let storage = &self.storage;
        let durable: Arc<dyn turbo_cache::StoragePort> = match &storage.durable_dir {
            Some(dir) => Arc::new(
                FileStore::open(dir)
                    .with_context(|| format!("Failed to open durable store in {}", dir.display()))?
                    .with_quota(storage.durable_quota_bytes),
            ),
            None => Arc::new(MemoryStore::new("durable").with_quota(storage.durable_quota_bytes)),
        };
        let ephemeral = Arc::new(MemoryStore::new("ephemeral").with_quota(storage.ephemeral_quota_bytes));
        Ok(Backends::new(durable, ephemeral))
    }

    /// The configured price table, or the built-in one.
    pub fn catalog(&self) -> Catalog {
        self.catalog.clone().unwrap_or_default()
    }

    /// Build an HTTP reconciliation client, if the remote is enabled.
    pub fn remote_client<T: Transport>(&self, transport: T) -> Option<HttpReconciliationClient<T>> {
        if !self.remote.enabled {
            return None;
        }
        let base_url = self.remote.base_url.as_deref()?;
        Some(HttpReconciliationClient::new(base_url, transport))
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the file-backed durable store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_dir: Option<PathBuf>,

    /// Byte quota of the durable store.
    #[serde(default = "default_quota")]
    pub durable_quota_bytes: usize,

    /// Byte quota of the ephemeral store.
    #[serde(default = "default_quota")]
    pub ephemeral_quota_bytes: usize,
}

fn default_quota() -> usize {
    DEFAULT_QUOTA_BYTES
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable_dir: None,
            durable_quota_bytes: default_quota(),
            ephemeral_quota_bytes: default_quota(),
        }
    }
}

/// Remote service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the profile and favorites service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Whether to talk to the service at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            enabled: true,
        }
    }
}
