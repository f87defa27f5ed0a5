//! Persisted, versioned, namespaced settings.
//!
//! [`ConfigStore`] owns the current [`ConfigSnapshot`], writes it to
//! `<config_dir>/config.yaml` on every effective change, and broadcasts a
//! [`ConfigChange`] carrying both the full new and the full old snapshot.
//! Consumers diff the pair themselves.

pub mod bootstrap;
pub mod migrations;

use crate::models::{ConfigSnapshot, NAMESPACES};
use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

pub use bootstrap::BootstrapSettings;
pub use migrations::Migration;

/// File name of the persisted settings inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Errors raised while loading, migrating or mutating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A migration failed. Fatal at startup.
    #[error("Config migration {range} failed: {message}")]
    Migration { range: String, message: String },

    #[error("Stored config version {0:?} is not a valid semantic version")]
    InvalidVersion(String),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: Utf8PathBuf, message: String },
}

/// Full before/after pair emitted on every effective settings change.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub new: Arc<ConfigSnapshot>,
    pub old: Arc<ConfigSnapshot>,
}

#[derive(Serialize)]
struct PersistedConfig<'a> {
    version: String,
    #[serde(flatten)]
    snapshot: &'a ConfigSnapshot,
}

/// Thread-safe settings store with change broadcasting.
///
/// Cloning is cheap; clones share the same snapshot and channel.
pub struct ConfigStore {
    /// `None` keeps the store purely in memory (used by tests and tools).
    config_path: Option<Utf8PathBuf>,

    /// Version written alongside the snapshot.
    version: Version,

    snapshot: Arc<RwLock<Arc<ConfigSnapshot>>>,

    change_tx: broadcast::Sender<ConfigChange>,
}

impl ConfigStore {
    /// Load settings from `config_dir`, running pending migrations first.
    ///
    /// A missing file yields the defaults, which are written back immediately
    /// so the version marker exists for the next start.
    pub fn load<P: AsRef<Utf8Path>>(config_dir: P, app_version: &Version) -> Result<Self, ConfigError> {
        Self::load_with_migrations(config_dir, app_version, &migrations::builtin())
    }

    pub fn load_with_migrations<P: AsRef<Utf8Path>>(
        config_dir: P,
        app_version: &Version,
        migrations: &[Migration],
    ) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref().to_path_buf();
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.clone(),
                source,
            })?;
        }

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let snapshot = if config_path.exists() {
            let contents = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                path: config_path.clone(),
                source,
            })?;
            Self::parse_and_migrate(&config_path, &contents, app_version, migrations)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", config_path);
            ConfigSnapshot::default()
        };

        let store = Self::with_snapshot(Some(config_path.clone()), app_version.clone(), snapshot);
        store.persist(&store.snapshot())?;

        tracing::info!("Loaded config from {}", config_path);
        Ok(store)
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(snapshot: ConfigSnapshot) -> Self {
        Self::with_snapshot(None, Version::new(0, 0, 0), snapshot)
    }

    fn with_snapshot(config_path: Option<Utf8PathBuf>, version: Version, snapshot: ConfigSnapshot) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            config_path,
            version,
            snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
            change_tx,
        }
    }

    fn parse_and_migrate(
        config_path: &Utf8Path,
        contents: &str,
        app_version: &Version,
        migrations: &[Migration],
    ) -> Result<ConfigSnapshot, ConfigError> {
        let mut document: Value =
            serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::Parse {
                path: config_path.to_path_buf(),
                message: e.to_string(),
            })?;
        if document.is_null() {
            document = Value::Object(Default::default());
        }

        let stored_version = match document.as_object_mut().and_then(|map| map.remove("version")) {
            Some(Value::String(raw)) => {
                Some(Version::parse(&raw).map_err(|_| ConfigError::InvalidVersion(raw))?)
            }
            _ => None,
        };

        let applied = migrations::run(&mut document, stored_version.as_ref(), app_version, migrations)?;
        if applied > 0 {
            tracing::info!(
                "Applied {} config migration(s) from {} to {}",
                applied,
                stored_version.map(|v| v.to_string()).unwrap_or_else(|| "unversioned".to_string()),
                app_version
            );
        }

        serde_json::from_value(document).map_err(|e| ConfigError::Parse {
            path: config_path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn persist(&self, snapshot: &ConfigSnapshot) -> Result<(), ConfigError> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };

        let persisted = PersistedConfig {
            version: self.version.to_string(),
            snapshot,
        };
        let yaml = serde_yaml_ng::to_string(&persisted).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Saved config to {}", path);
        Ok(())
    }

    /// Current snapshot. Cheap: shares the underlying allocation.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Execute a function with read access to the snapshot
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ConfigSnapshot) -> R,
    {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Value at `namespace.fieldName` (or a whole namespace).
    pub fn get(&self, key: &str) -> Result<Value, ConfigError> {
        let document = serde_json::to_value(&*self.snapshot()).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        key.split('.')
            .try_fold(&document, |node, segment| node.get(segment))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    /// Replace the value at `namespace.fieldName`.
    ///
    /// The value is validated by deserializing the whole document back into a
    /// [`ConfigSnapshot`]; a type mismatch is rejected without side effects.
    /// Returns the emitted change, or `None` if nothing changed.
    pub fn set(&self, key: &str, value: Value) -> Result<Option<ConfigChange>, ConfigError> {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());

        let mut document = serde_json::to_value(&**guard).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let slot = key
            .split('.')
            .try_fold(&mut document, |node, segment| node.get_mut(segment))
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        *slot = value;

        let updated: ConfigSnapshot =
            serde_json::from_value(document).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        self.commit(&mut guard, updated)
    }

    /// Apply a typed mutation.
    ///
    /// # Example
    /// ```ignore
    /// store.update(|s| s.integrations.companion_server_enabled = true)?;
    /// ```
    pub fn update<F>(&self, update_fn: F) -> Result<Option<ConfigChange>, ConfigError>
    where
        F: FnOnce(&mut ConfigSnapshot),
    {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = (**guard).clone();
        update_fn(&mut updated);
        self.commit(&mut guard, updated)
    }

    /// Restore one namespace to its defaults.
    pub fn reset(&self, namespace: &str) -> Result<Option<ConfigChange>, ConfigError> {
        if !NAMESPACES.contains(&namespace) {
            return Err(ConfigError::UnknownKey(namespace.to_string()));
        }

        let defaults = serde_json::to_value(ConfigSnapshot::default()).map_err(|e| {
            ConfigError::InvalidValue {
                key: namespace.to_string(),
                message: e.to_string(),
            }
        })?;
        let value = defaults
            .get(namespace)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownKey(namespace.to_string()))?;

        tracing::info!("Resetting config namespace {}", namespace);
        self.set(namespace, value)
    }

    /// Subscribe to change pairs.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }

    pub fn config_path(&self) -> Option<&Utf8Path> {
        self.config_path.as_deref()
    }

    fn commit(
        &self,
        guard: &mut Arc<ConfigSnapshot>,
        updated: ConfigSnapshot,
    ) -> Result<Option<ConfigChange>, ConfigError> {
        if **guard == updated {
            return Ok(None);
        }

        self.persist(&updated)?;

        let new = Arc::new(updated);
        let old = std::mem::replace(guard, Arc::clone(&new));
        let change = ConfigChange { new, old };

        // Ignore send errors - it's OK if no one is listening
        let _ = self.change_tx.send(change.clone());

        Ok(Some(change))
    }
}

impl Clone for ConfigStore {
    fn clone(&self) -> Self {
        Self {
            config_path: self.config_path.clone(),
            version: self.version.clone(),
            snapshot: Arc::clone(&self.snapshot),
            change_tx: self.change_tx.clone(),
        }
    }
}
