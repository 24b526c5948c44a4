//! Configuration Manager
//!
//! Owns the authoritative snapshot and coordinates the local store and the
//! remote backup. Startup reconciles all three sources once; every later write
//! goes local first and republishes the snapshot from the local store before
//! the remote backup is attempted.

use crate::ConfigError;
use crate::events::{ConfigChangeEvent, Consistency};
use crate::merger::{self, ConfigMap, ConfigSnapshot, ConfigValue};
use crate::remote::RemoteBackup;
use crate::settings::CONFIG_NAME_VAR;
use crate::storage::LocalStore;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{error, info, warn};

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
}

enum State {
    Uninitialized,
    Initializing,
    Ready(Arc<ConfigSnapshot>),
}

impl State {
    fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::Uninitialized => Lifecycle::Uninitialized,
            Self::Initializing => Lifecycle::Initializing,
            Self::Ready(_) => Lifecycle::Ready,
        }
    }
}

/// Result of a successful `set_config`
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    /// Snapshot after the write
    pub snapshot: Arc<ConfigSnapshot>,
    /// Whether the remote backup took the write
    pub consistency: Consistency,
}

/// Configuration manager builder
pub struct ConfigManagerBuilder {
    store_path: Option<PathBuf>,
    backup: Option<Arc<dyn RemoteBackup>>,
    instance_id: Option<String>,
    defaults: ConfigMap,
}

impl ConfigManagerBuilder {
    /// Create a new builder with the compiled-in defaults
    pub fn new() -> Self {
        Self {
            store_path: None,
            backup: None,
            instance_id: None,
            defaults: merger::defaults(),
        }
    }

    /// Use an explicit local store file
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Use `database/config.json` under `dir`
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_path = Some(dir.into().join(LocalStore::DEFAULT_PATH));
        self
    }

    /// Set the remote backup backend
    pub fn with_backup(mut self, backup: Arc<dyn RemoteBackup>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Set the instance name the remote record is stored under
    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Add or replace a compiled-in default
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Open the local store and build the manager
    pub fn build(self) -> Result<ConfigManager, ConfigError> {
        let backup = self
            .backup
            .ok_or_else(|| ConfigError::missing_setting("remote backup"))?;
        let instance_id = self
            .instance_id
            .ok_or_else(|| ConfigError::missing_setting(CONFIG_NAME_VAR))?;
        let store_path = self
            .store_path
            .unwrap_or_else(|| PathBuf::from(LocalStore::DEFAULT_PATH));

        let store = LocalStore::open(store_path)?;
        let (event_tx, _) = broadcast::channel(100);

        Ok(ConfigManager {
            defaults: self.defaults,
            store: Mutex::new(store),
            backup,
            instance_id,
            state: RwLock::new(State::Uninitialized),
            event_bus: event_tx,
        })
    }
}

impl Default for ConfigManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Central configuration manager
pub struct ConfigManager {
    /// Compiled-in defaults
    defaults: ConfigMap,
    /// Local store; the lock also serialises writers
    store: Mutex<LocalStore>,
    /// Remote backup backend
    backup: Arc<dyn RemoteBackup>,
    /// Instance name of the remote record
    instance_id: String,
    /// Lifecycle and published snapshot
    state: RwLock<State>,
    /// Event bus for broadcasting changes
    event_bus: broadcast::Sender<ConfigChangeEvent>,
}

impl ConfigManager {
    /// Create a new builder
    pub fn builder() -> ConfigManagerBuilder {
        ConfigManagerBuilder::new()
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.state.read().await.lifecycle()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Subscribe to configuration changes
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.event_bus.subscribe()
    }

    /// Reconcile defaults, local and remote state and become ready.
    ///
    /// Allowed once per manager. `overrides` only seed an empty local store.
    /// Any error leaves the manager unusable; callers should exit.
    pub async fn setup(&self, overrides: ConfigMap) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        {
            let mut state = self.state.write().await;
            if !matches!(*state, State::Uninitialized) {
                warn!("Configuration setup called more than once");
                return Err(ConfigError::AlreadyInitialized);
            }
            *state = State::Initializing;
        }

        info!(
            instance = %self.instance_id,
            backend = self.backup.name(),
            "Initializing configuration"
        );

        let snapshot = Arc::new(self.reconcile(overrides).await?);

        *self.state.write().await = State::Ready(Arc::clone(&snapshot));
        let _ = self.event_bus.send(ConfigChangeEvent::reconciled());

        info!(keys = snapshot.values().len(), "Configuration ready");
        Ok(snapshot)
    }

    async fn reconcile(&self, overrides: ConfigMap) -> Result<ConfigSnapshot, ConfigError> {
        let mut store = self.store.lock().await;

        if store.is_empty() {
            let mut seed = self.defaults.clone();
            seed.extend(overrides);
            store.replace_all(seed)?;
            info!(path = %store.path().display(), "Seeded local config store");
        }

        let record = self.backup.restore(&self.instance_id).await?;
        if record.is_none() {
            warn!(
                instance = %self.instance_id,
                "No remote backup found; expected on first run, otherwise the record was lost"
            );
        }

        let snapshot = merger::merge(
            &self.defaults,
            Some(store.all()),
            record.as_ref().map(|r| &r.cfg),
        );

        store.replace_all(snapshot.values().clone())?;
        self.backup
            .backup(&self.instance_id, snapshot.values())
            .await?;

        if !snapshot.has_token() {
            error!("Token is not configured after reconciliation");
            return Err(ConfigError::MissingToken);
        }

        Ok(snapshot)
    }

    /// Get the current snapshot
    pub async fn get_config(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        match &*self.state.read().await {
            State::Ready(snapshot) => Ok(Arc::clone(snapshot)),
            _ => Err(ConfigError::NotInitialized),
        }
    }

    /// Set one key.
    ///
    /// The value is coerced to the stored type, persisted locally and then
    /// backed up together with the rest of the local map. A failed backup does
    /// not fail the call; it is reported as [`Consistency::Degraded`].
    pub async fn set_config(
        &self,
        key: &str,
        value: ConfigValue,
    ) -> Result<ConfigUpdate, ConfigError> {
        self.get_config().await?;

        let mut store = self.store.lock().await;
        let current = self.get_config().await?;

        let value = merger::coerce(key, store.get(key), value)?;
        store.set(key, value.clone())?;

        // Reads match the local store from here on, even if this call is
        // dropped during the backup
        let snapshot = Arc::new(current.with_local(store.all()));
        *self.state.write().await = State::Ready(Arc::clone(&snapshot));

        let consistency = match self.backup.backup(&self.instance_id, store.all()).await {
            Ok(()) => Consistency::Synced,
            Err(e) => {
                error!(
                    key,
                    error = %e,
                    "Remote backup failed; local and remote config diverge until the next successful write"
                );
                Consistency::Degraded {
                    reason: e.to_string(),
                }
            }
        };
        drop(store);

        let _ = self
            .event_bus
            .send(ConfigChangeEvent::set(key, &value, consistency.clone()));

        info!(key, degraded = consistency.is_degraded(), "Configuration set");
        Ok(ConfigUpdate {
            snapshot,
            consistency,
        })
    }

    /// Set one key from raw command text
    pub async fn set_input(&self, key: &str, text: &str) -> Result<ConfigUpdate, ConfigError> {
        self.set_config(key, ConfigValue::from_input(text)).await
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("instance_id", &self.instance_id)
            .field("backend", &self.backup.name())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TOKEN_KEY;
    use crate::events::ConfigOperation;
    use crate::remote::{MemoryBackup, RemoteRecord};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const INSTANCE: &str = "standup-bot";

    /// Memory backup with switchable failures
    #[derive(Default)]
    struct FlakyBackup {
        inner: MemoryBackup,
        fail_backup: AtomicBool,
        fail_restore: AtomicBool,
        hang_backup: AtomicBool,
        slow_backup: AtomicBool,
        backups: AtomicUsize,
    }

    impl FlakyBackup {
        fn with_record(record: RemoteRecord) -> Self {
            Self {
                inner: MemoryBackup::with_record(record),
                ..Default::default()
            }
        }

        async fn remote_cfg(&self) -> Option<ConfigMap> {
            self.inner.record(INSTANCE).await.map(|r| r.cfg)
        }
    }

    #[async_trait]
    impl RemoteBackup for FlakyBackup {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn restore(&self, instance_id: &str) -> Result<Option<RemoteRecord>, ConfigError> {
            if self.fail_restore.load(Ordering::SeqCst) {
                return Err(ConfigError::remote_restore("store unavailable"));
            }
            self.inner.restore(instance_id).await
        }

        async fn backup(&self, instance_id: &str, cfg: &ConfigMap) -> Result<(), ConfigError> {
            if self.fail_backup.load(Ordering::SeqCst) {
                return Err(ConfigError::remote_backup("store unavailable"));
            }
            if self.hang_backup.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.slow_backup.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            self.backups.fetch_add(1, Ordering::SeqCst);
            self.inner.backup(instance_id, cfg).await
        }
    }

    fn manager(dir: &Path, backup: &Arc<FlakyBackup>) -> ConfigManager {
        ConfigManager::builder()
            .with_workdir(dir)
            .with_backup(backup.clone())
            .with_instance(INSTANCE)
            .build()
            .unwrap()
    }

    fn with_token() -> ConfigMap {
        ConfigMap::from([(TOKEN_KEY.to_string(), ConfigValue::from("xoxb-test"))])
    }

    fn local_file(dir: &Path) -> ConfigMap {
        LocalStore::open_in(dir).unwrap().all().clone()
    }

    async fn ready(dir: &Path, backup: &Arc<FlakyBackup>) -> ConfigManager {
        let manager = manager(dir, backup);
        manager.setup(with_token()).await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_access_before_setup_fails() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path(), &Arc::new(FlakyBackup::default()));

        assert_eq!(manager.lifecycle().await, Lifecycle::Uninitialized);
        assert!(matches!(
            manager.get_config().await,
            Err(ConfigError::NotInitialized)
        ));
        assert!(matches!(
            manager.set_input("name", "Foo").await,
            Err(ConfigError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_first_run_uses_defaults_and_backs_up() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        assert_eq!(manager.lifecycle().await, Lifecycle::Ready);
        let config = manager.get_config().await.unwrap();
        for (key, value) in merger::defaults() {
            assert_eq!(config.get(&key), Some(&value), "default for {key}");
        }

        let remote = backup.remote_cfg().await.unwrap();
        assert_eq!(&remote, config.values());
        assert_eq!(&local_file(temp_dir.path()), config.values());
    }

    #[tokio::test]
    async fn test_first_run_overrides_seed_local_store() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = manager(temp_dir.path(), &backup);

        let mut overrides = with_token();
        overrides.insert("channel".into(), ConfigValue::from("standup"));
        let config = manager.setup(overrides).await.unwrap();

        assert_eq!(config.get_str("channel"), Some("standup"));
        assert_eq!(config.get_str("name"), Some("SlacklibBot"));
    }

    #[tokio::test]
    async fn test_setup_twice_keeps_first_state() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;
        manager.set_input("name", "First").await.unwrap();

        let err = manager.setup(ConfigMap::new()).await.unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyInitialized));
        assert!(err.is_setup_error());

        assert_eq!(manager.lifecycle().await, Lifecycle::Ready);
        let config = manager.get_config().await.unwrap();
        assert_eq!(config.get_str("name"), Some("First"));
    }

    #[tokio::test]
    async fn test_missing_token_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path(), &Arc::new(FlakyBackup::default()));

        let err = manager.setup(ConfigMap::new()).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));

        assert_eq!(manager.lifecycle().await, Lifecycle::Initializing);
        assert!(matches!(
            manager.get_config().await,
            Err(ConfigError::NotInitialized)
        ));
        assert!(matches!(
            manager.setup(with_token()).await,
            Err(ConfigError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn test_empty_token_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(temp_dir.path(), &Arc::new(FlakyBackup::default()));

        let overrides = ConfigMap::from([(TOKEN_KEY.to_string(), ConfigValue::from(""))]);
        assert!(matches!(
            manager.setup(overrides).await,
            Err(ConfigError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_remote_takes_precedence_at_startup() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut store = LocalStore::open_in(temp_dir.path()).unwrap();
            let mut local = with_token();
            local.insert("a".into(), ConfigValue::from(1));
            local.insert("b".into(), ConfigValue::from(1));
            store.replace_all(local).unwrap();
        }

        let remote = ConfigMap::from([
            ("a".to_string(), ConfigValue::from(2)),
            ("name".to_string(), ConfigValue::from("Restored")),
        ]);
        let backup = Arc::new(FlakyBackup::with_record(RemoteRecord::new(INSTANCE, remote)));

        let manager = manager(temp_dir.path(), &backup);
        let config = manager.setup(ConfigMap::new()).await.unwrap();

        assert_eq!(config.get("a"), Some(&ConfigValue::from(2)));
        assert_eq!(config.get("b"), Some(&ConfigValue::from(1)));
        assert_eq!(config.get_str("name"), Some("Restored"));
        assert_eq!(config.get_str("channel"), Some("general"));

        // Both stores hold the reconciled map
        assert_eq!(&local_file(temp_dir.path()), config.values());
        assert_eq!(&backup.remote_cfg().await.unwrap(), config.values());
    }

    #[tokio::test]
    async fn test_remote_token_satisfies_setup() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::with_record(RemoteRecord::new(
            INSTANCE,
            with_token(),
        )));

        let manager = manager(temp_dir.path(), &backup);
        let config = manager.setup(ConfigMap::new()).await.unwrap();
        assert!(config.has_token());
    }

    #[tokio::test]
    async fn test_restore_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        backup.fail_restore.store(true, Ordering::SeqCst);

        let manager = manager(temp_dir.path(), &backup);
        let err = manager.setup(with_token()).await.unwrap_err();
        assert!(matches!(err, ConfigError::RemoteRestore(_)));
        assert_eq!(manager.lifecycle().await, Lifecycle::Initializing);
    }

    #[tokio::test]
    async fn test_backup_failure_during_setup_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        backup.fail_backup.store(true, Ordering::SeqCst);

        let manager = manager(temp_dir.path(), &backup);
        let err = manager.setup(with_token()).await.unwrap_err();
        assert!(matches!(err, ConfigError::RemoteBackup(_)));
    }

    #[tokio::test]
    async fn test_set_coerces_and_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        let update = manager.set_input("timezone", "10").await.unwrap();
        assert_eq!(update.consistency, Consistency::Synced);
        assert_eq!(update.snapshot.get("timezone"), Some(&ConfigValue::from(10)));

        let config = manager.get_config().await.unwrap();
        assert_eq!(config.get("timezone").and_then(ConfigValue::as_i64), Some(10));
        assert_eq!(
            local_file(temp_dir.path()).get("timezone"),
            Some(&ConfigValue::from(10))
        );

        let update = manager.set_input("debug", "true").await.unwrap();
        assert_eq!(update.snapshot.get("debug"), Some(&ConfigValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_set_same_value_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        let first = manager.set_input("channel", "ops").await.unwrap();
        let second = manager.set_input("channel", "ops").await.unwrap();

        assert_eq!(first.snapshot.values(), second.snapshot.values());
        assert_eq!(
            backup.remote_cfg().await.unwrap(),
            first.snapshot.values().clone()
        );
    }

    #[tokio::test]
    async fn test_coercion_failure_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;
        let backups_before = backup.backups.load(Ordering::SeqCst);

        let err = manager
            .set_input("timezone", "notanumber")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let config = manager.get_config().await.unwrap();
        assert_eq!(config.get("timezone"), Some(&ConfigValue::from(8)));
        assert_eq!(
            local_file(temp_dir.path()).get("timezone"),
            Some(&ConfigValue::from(8))
        );
        assert_eq!(backup.backups.load(Ordering::SeqCst), backups_before);
    }

    #[tokio::test]
    async fn test_unknown_key_is_stored_as_string() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        let update = manager.set_input("standup_time", "9").await.unwrap();
        assert_eq!(update.snapshot.get("standup_time"), Some(&ConfigValue::from("9")));
    }

    #[tokio::test]
    async fn test_presentation_follows_updates() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        manager.set_input("name", "Foo").await.unwrap();
        manager.set_input("emoji", ":x:").await.unwrap();

        let params = manager.get_config().await.unwrap().presentation();
        assert_eq!(params.username, "Foo");
        assert_eq!(params.icon_emoji, ":x:");
        assert!(!params.as_user);
    }

    #[tokio::test]
    async fn test_degraded_write_resyncs_on_next_success() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        backup.fail_backup.store(true, Ordering::SeqCst);
        let update = manager.set_input("name", "Offline").await.unwrap();
        assert!(update.consistency.is_degraded());
        assert_eq!(update.snapshot.get_str("name"), Some("Offline"));
        assert_eq!(
            local_file(temp_dir.path()).get("name"),
            Some(&ConfigValue::from("Offline"))
        );
        let remote = backup.remote_cfg().await.unwrap();
        assert_eq!(remote.get("name"), Some(&ConfigValue::from("SlacklibBot")));

        backup.fail_backup.store(false, Ordering::SeqCst);
        let update = manager.set_input("channel", "ops").await.unwrap();
        assert_eq!(update.consistency, Consistency::Synced);

        let remote = backup.remote_cfg().await.unwrap();
        assert_eq!(remote, local_file(temp_dir.path()));
        assert_eq!(remote.get("name"), Some(&ConfigValue::from("Offline")));
    }

    #[tokio::test]
    async fn test_dropped_set_still_publishes_local_write() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;

        backup.hang_backup.store(true, Ordering::SeqCst);
        let result =
            tokio::time::timeout(Duration::from_millis(50), manager.set_input("name", "Cancelled"))
                .await;
        assert!(result.is_err());

        let config = manager.get_config().await.unwrap();
        assert_eq!(config.get_str("name"), Some("Cancelled"));
        assert_eq!(config.values(), &local_file(temp_dir.path()));

        backup.hang_backup.store(false, Ordering::SeqCst);
        let update = manager.set_input("channel", "ops").await.unwrap();
        assert_eq!(update.consistency, Consistency::Synced);
        assert_eq!(update.snapshot.get_str("name"), Some("Cancelled"));

        let local = local_file(temp_dir.path());
        assert_eq!(manager.get_config().await.unwrap().values(), &local);
        assert_eq!(backup.remote_cfg().await.unwrap(), local);
    }

    #[tokio::test]
    async fn test_local_write_failure_fails_set() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;
        let backups_before = backup.backups.load(Ordering::SeqCst);
        let before = manager.get_config().await.unwrap();

        std::fs::remove_dir_all(temp_dir.path().join("database")).unwrap();

        let err = manager.set_input("name", "Lost").await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));

        let config = manager.get_config().await.unwrap();
        assert_eq!(config.values(), before.values());
        assert_eq!(config.get_str("name"), Some("SlacklibBot"));
        assert_eq!(backup.backups.load(Ordering::SeqCst), backups_before);
        assert_eq!(
            backup.remote_cfg().await.unwrap().get("name"),
            Some(&ConfigValue::from("SlacklibBot"))
        );
    }

    #[tokio::test]
    async fn test_overlapping_sets_keep_both_writes() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;
        backup.slow_backup.store(true, Ordering::SeqCst);

        let (first, second) = tokio::join!(
            manager.set_input("name", "Racer"),
            manager.set_input("channel", "race")
        );
        assert_eq!(first.unwrap().consistency, Consistency::Synced);
        assert_eq!(second.unwrap().consistency, Consistency::Synced);

        let config = manager.get_config().await.unwrap();
        assert_eq!(config.get_str("name"), Some("Racer"));
        assert_eq!(config.get_str("channel"), Some("race"));

        let local = local_file(temp_dir.path());
        assert_eq!(config.values(), &local);
        assert_eq!(backup.remote_cfg().await.unwrap(), local);
    }

    #[tokio::test]
    async fn test_set_broadcasts_event() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        let manager = ready(temp_dir.path(), &backup).await;
        let mut rx = manager.subscribe();

        manager.set_input("channel", "ops").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.operation, ConfigOperation::Set);
        assert_eq!(event.key.as_deref(), Some("channel"));
        assert_eq!(event.new_value, Some(ConfigValue::from("ops")));
        assert_eq!(event.consistency, Consistency::Synced);
    }

    #[tokio::test]
    async fn test_restart_restores_previous_writes() {
        let temp_dir = TempDir::new().unwrap();
        let backup = Arc::new(FlakyBackup::default());
        {
            let manager = ready(temp_dir.path(), &backup).await;
            manager.set_input("name", "Persisted").await.unwrap();
        }

        // Fresh machine: no local file, same remote backup
        let fresh_dir = TempDir::new().unwrap();
        let manager = manager(fresh_dir.path(), &backup);
        let config = manager.setup(ConfigMap::new()).await.unwrap();
        assert_eq!(config.get_str("name"), Some("Persisted"));
        assert!(config.has_token());
    }

    #[tokio::test]
    async fn test_builder_requires_backup_and_instance() {
        let temp_dir = TempDir::new().unwrap();

        let result = ConfigManager::builder()
            .with_workdir(temp_dir.path())
            .with_instance(INSTANCE)
            .build();
        assert!(matches!(result, Err(ConfigError::MissingSetting(_))));

        let result = ConfigManager::builder()
            .with_workdir(temp_dir.path())
            .with_backup(Arc::new(MemoryBackup::new()))
            .build();
        assert!(matches!(result, Err(ConfigError::MissingSetting(ref v)) if v == CONFIG_NAME_VAR));
    }

    #[tokio::test]
    async fn test_custom_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::builder()
            .with_workdir(temp_dir.path())
            .with_backup(Arc::new(MemoryBackup::new()))
            .with_instance(INSTANCE)
            .with_default("standup_time", "09:30")
            .build()
            .unwrap();

        let config = manager.setup(with_token()).await.unwrap();
        assert_eq!(config.get_str("standup_time"), Some("09:30"));
    }
}
