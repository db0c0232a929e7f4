//! Connection configuration and the store that persists it.
//!
//! A [`Configuration`] is the mapping a default connection is built from.
//! Only `node`, `num_retries`, `autoconnect` and `nobroadcast` are read;
//! every other key is ignored.
//!
//! A [`ConfigStore`] persists one configuration and can snapshot it
//! (`refresh_backup`) and roll back to the newest snapshot
//! (`recover_with_latest_backup`). Snapshot contents are opaque here.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::policy::{BackoffConfig, DEFAULT_NUM_RETRIES};

/// The mapping a default connection is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Candidate endpoints, first is primary. Accepts a string or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub node: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoconnect: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nobroadcast: Option<bool>,
}

impl Configuration {
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node: nodes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse from a JSON mapping such as `{"node": ["https://…"]}`.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Connection options this configuration asks for, defaults filled in.
    pub fn options(&self) -> ConnectionOptions {
        let defaults = ConnectionOptions::default();
        ConnectionOptions {
            num_retries: self.num_retries.unwrap_or(defaults.num_retries),
            autoconnect: self.autoconnect.unwrap_or(defaults.autoconnect),
            nobroadcast: self.nobroadcast.unwrap_or(defaults.nobroadcast),
            backoff: defaults.backoff,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null,
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Null => Vec::new(),
    })
}

/// Per-handle connection policy. Each field is independently overridable.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    /// Retries after the first connect attempt. `0` means exactly one attempt.
    pub num_retries: u32,
    /// Connect during construction instead of on first use.
    pub autoconnect: bool,
    /// Passed through untouched to the write path.
    pub nobroadcast: bool,
    pub backoff: BackoffConfig,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            num_retries: DEFAULT_NUM_RETRIES,
            autoconnect: true,
            nobroadcast: false,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ConnectionOptions {
    pub fn num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    pub fn autoconnect(mut self, autoconnect: bool) -> Self {
        self.autoconnect = autoconnect;
        self
    }

    pub fn nobroadcast(mut self, nobroadcast: bool) -> Self {
        self.nobroadcast = nobroadcast;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Persists one configuration with snapshot/restore.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<Configuration, ConfigError>;

    async fn save(&self, config: Configuration) -> Result<(), ConfigError>;

    /// Take a snapshot of the current configuration.
    async fn refresh_backup(&self) -> Result<(), ConfigError>;

    /// Replace the current configuration with the newest snapshot.
    async fn recover_with_latest_backup(&self) -> Result<(), ConfigError>;

    /// Overwrite the stored node list, keeping every other setting.
    async fn set_default_nodes(&self, nodes: Vec<String>) -> Result<(), ConfigError> {
        let mut config = self.load().await?;
        config.node = nodes;
        self.save(config).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    current: Configuration,
    backups: Vec<(DateTime<Utc>, Configuration)>,
}

/// In-memory configuration store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryConfigStore {
    state: Mutex<MemoryState>,
}

impl MemoryConfigStore {
    pub fn new(config: Configuration) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                current: config,
                backups: Vec::new(),
            }),
        }
    }

    pub fn backup_count(&self) -> usize {
        self.lock().backups.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Configuration, ConfigError> {
        Ok(self.lock().current.clone())
    }

    async fn save(&self, config: Configuration) -> Result<(), ConfigError> {
        self.lock().current = config;
        Ok(())
    }

    async fn refresh_backup(&self) -> Result<(), ConfigError> {
        let mut state = self.lock();
        let snapshot = state.current.clone();
        state.backups.push((Utc::now(), snapshot));
        Ok(())
    }

    async fn recover_with_latest_backup(&self) -> Result<(), ConfigError> {
        let mut state = self.lock();
        let latest = state
            .backups
            .iter()
            .max_by_key(|(taken_at, _)| *taken_at)
            .map(|(_, config)| config.clone())
            .ok_or(ConfigError::NoBackup)?;
        state.current = latest;
        Ok(())
    }
}

// ─── JSON file store ──────────────────────────────────────────────────────────

const BACKUP_TIMESTAMP: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Stores the configuration as a JSON file. Snapshots are sibling files named
/// `<file>.backup-<timestamp>`; the newest timestamp wins on recovery.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_prefix(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.json".into());
        format!("{name}.backup-")
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    async fn latest_backup(&self) -> Result<Option<PathBuf>, ConfigError> {
        let prefix = self.backup_prefix();
        let mut entries = match tokio::fs::read_dir(self.dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut latest: Option<(String, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name.strip_prefix(&prefix) else {
                continue;
            };
            // Fixed-width timestamps sort lexicographically.
            if latest.as_ref().map_or(true, |(best, _)| stamp > best.as_str()) {
                latest = Some((stamp.to_string(), entry.path()));
            }
        }
        Ok(latest.map(|(_, path)| path))
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<Configuration, ConfigError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Configuration::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, config: Configuration) -> Result<(), ConfigError> {
        let bytes = serde_json::to_vec_pretty(&config)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn refresh_backup(&self) -> Result<(), ConfigError> {
        let config = self.load().await?;
        let stamp = Utc::now().format(BACKUP_TIMESTAMP);
        let backup = self.dir().join(format!("{}{stamp}", self.backup_prefix()));
        tokio::fs::write(&backup, serde_json::to_vec_pretty(&config)?).await?;
        tracing::debug!(path = %backup.display(), "configuration snapshot written");
        Ok(())
    }

    async fn recover_with_latest_backup(&self) -> Result<(), ConfigError> {
        let backup = self.latest_backup().await?.ok_or(ConfigError::NoBackup)?;
        let bytes = tokio::fs::read(&backup).await?;
        let config: Configuration = serde_json::from_slice(&bytes)?;
        self.save(config).await?;
        tracing::debug!(path = %backup.display(), "configuration restored from snapshot");
        Ok(())
    }
}
