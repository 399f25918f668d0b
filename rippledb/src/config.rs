//! Configuration management for a rippledb database.

use crate::common::{
    atomic, Atomic, ReadExecutor, WriteExecutor, DEFAULT_CHANGE_DEBOUNCE_MS, DEFAULT_DEFER_INTERVAL_MS,
    DEFAULT_DEFER_THRESHOLD, DOC_ID,
};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::index::{keyed_index_kind, IndexKind};
use crate::FIELD_SEPARATOR;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Batch sizes above which writes are queued instead of applied at once.
///
/// A queued batch is drained in chunks of the same size, one chunk per
/// tick of the queue driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferThresholds {
    pub insert: usize,
    pub update: usize,
    pub remove: usize,
    pub upsert: usize,
}

impl DeferThresholds {
    /// The same threshold for every operation.
    pub fn uniform(threshold: usize) -> Self {
        DeferThresholds {
            insert: threshold,
            update: threshold,
            remove: threshold,
            upsert: threshold,
        }
    }
}

impl Default for DeferThresholds {
    fn default() -> Self {
        DeferThresholds::uniform(DEFAULT_DEFER_THRESHOLD)
    }
}

/// Database-wide defaults applied to every collection, and the registry of
/// index kinds.
///
/// Settings are fixed once the database is opened; setters fail with
/// [ErrorKind::InvalidOperation] afterwards.
///
/// # Examples
///
/// ```rust
/// use rippledb::config::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new();
/// config.set_primary_key("id").unwrap();
/// config.set_change_debounce(None).unwrap();
/// assert_eq!(config.primary_key(), "id");
/// assert_eq!(config.change_debounce(), None);
/// assert_eq!(config.defer_interval(), Duration::from_millis(1));
/// ```
#[derive(Clone)]
pub struct DatabaseConfig {
    inner: Arc<DatabaseConfigInner>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        DatabaseConfig {
            inner: Arc::new(DatabaseConfigInner::new()),
        }
    }

    /// Name of the primary-key field of new collections, `_id` by default.
    pub fn primary_key(&self) -> String {
        self.inner.primary_key.read_with(|it| it.clone())
    }

    pub fn set_primary_key(&self, primary_key: &str) -> RippleResult<()> {
        self.inner.ensure_configurable("Primary key")?;
        if primary_key.is_empty() {
            log::error!("Primary key field name cannot be empty");
            return Err(RippleError::new(
                "Primary key field name cannot be empty",
                ErrorKind::ConfigError,
            ));
        }
        self.inner.primary_key.write_with(|it| *it = primary_key.to_string());
        Ok(())
    }

    pub fn defer_thresholds(&self) -> DeferThresholds {
        self.inner.defer_thresholds.read_with(|it| *it)
    }

    pub fn set_defer_thresholds(&self, thresholds: DeferThresholds) -> RippleResult<()> {
        self.inner.ensure_configurable("Defer thresholds")?;
        if thresholds.insert == 0 || thresholds.update == 0 || thresholds.remove == 0 || thresholds.upsert == 0 {
            log::error!("Defer thresholds must be positive: {:?}", thresholds);
            return Err(RippleError::new("Defer thresholds must be positive", ErrorKind::ConfigError));
        }
        self.inner.defer_thresholds.write_with(|it| *it = thresholds);
        Ok(())
    }

    /// Pause between two drained chunks of a deferred batch.
    pub fn defer_interval(&self) -> Duration {
        self.inner.defer_interval.read_with(|it| *it)
    }

    pub fn set_defer_interval(&self, interval: Duration) -> RippleResult<()> {
        self.inner.ensure_configurable("Defer interval")?;
        self.inner.defer_interval.write_with(|it| *it = interval);
        Ok(())
    }

    /// Window in which change notifications are coalesced. `None` emits a
    /// change event after every mutation.
    pub fn change_debounce(&self) -> Option<Duration> {
        self.inner.change_debounce.read_with(|it| *it)
    }

    pub fn set_change_debounce(&self, window: Option<Duration>) -> RippleResult<()> {
        self.inner.ensure_configurable("Change debounce")?;
        self.inner.change_debounce.write_with(|it| *it = window);
        Ok(())
    }

    /// Whether deferred batches are drained by the shared scheduler. When
    /// disabled, queued work waits for `process_queue` or `drain_queue`.
    pub fn auto_drain(&self) -> bool {
        self.inner.auto_drain.load(Ordering::Relaxed)
    }

    pub fn set_auto_drain(&self, auto_drain: bool) -> RippleResult<()> {
        self.inner.ensure_configurable("Auto drain")?;
        self.inner.auto_drain.store(auto_drain, Ordering::Relaxed);
        Ok(())
    }

    pub fn field_separator(&self) -> String {
        FIELD_SEPARATOR.read_with(|it| it.clone())
    }

    /// Changes the separator of field paths for the whole process.
    pub fn set_field_separator(&self, separator: &str) -> RippleResult<()> {
        self.inner.ensure_configurable("Field separator")?;
        if separator.is_empty() {
            log::error!("Field separator cannot be empty");
            return Err(RippleError::new("Field separator cannot be empty", ErrorKind::ConfigError));
        }
        FIELD_SEPARATOR.write_with(|it| *it = separator.to_string());
        Ok(())
    }

    /// Registers an additional index kind, usable through
    /// [IndexOptions](crate::index::IndexOptions).
    pub fn register_index_kind(&self, kind: IndexKind) -> RippleResult<()> {
        self.inner.ensure_configurable("Index kinds")?;
        let name = kind.kind_name();
        if self.inner.index_kinds.contains_key(&name) {
            log::error!("Index kind {} is already registered", name);
            return Err(RippleError::new(
                &format!("Index kind {} is already registered", name),
                ErrorKind::ConfigError,
            ));
        }
        self.inner.index_kinds.insert(name, kind);
        Ok(())
    }

    pub fn find_index_kind(&self, name: &str) -> RippleResult<IndexKind> {
        match self.inner.index_kinds.get(name) {
            Some(kind) => Ok(kind.value().clone()),
            None => {
                log::error!("No index kind registered as {}", name);
                Err(RippleError::new(
                    &format!("No index kind registered as {}", name),
                    ErrorKind::IndexNotFound,
                ))
            }
        }
    }

    pub fn index_kind_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.index_kinds.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub(crate) fn initialize(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }
}

struct DatabaseConfigInner {
    configured: AtomicBool,
    primary_key: Atomic<String>,
    defer_thresholds: Atomic<DeferThresholds>,
    defer_interval: Atomic<Duration>,
    change_debounce: Atomic<Option<Duration>>,
    auto_drain: AtomicBool,
    index_kinds: DashMap<String, IndexKind>,
}

impl DatabaseConfigInner {
    fn new() -> Self {
        let index_kinds = DashMap::new();
        let keyed = keyed_index_kind();
        index_kinds.insert(keyed.kind_name(), keyed);

        DatabaseConfigInner {
            configured: AtomicBool::new(false),
            primary_key: atomic(DOC_ID.to_string()),
            defer_thresholds: atomic(DeferThresholds::default()),
            defer_interval: atomic(Duration::from_millis(DEFAULT_DEFER_INTERVAL_MS)),
            change_debounce: atomic(Some(Duration::from_millis(DEFAULT_CHANGE_DEBOUNCE_MS))),
            auto_drain: AtomicBool::new(true),
            index_kinds,
        }
    }

    fn ensure_configurable(&self, setting: &str) -> RippleResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after initialization", setting);
            return Err(RippleError::new(
                &format!("{} cannot be changed after initialization", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
