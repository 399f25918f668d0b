use crate::config::{DatabaseConfig, DeferThresholds};
use crate::database::Database;
use crate::errors::{RippleError, RippleResult};
use crate::index::IndexKind;
use std::time::Duration;

/// Fluent configuration of a [Database].
///
/// The first invalid setting is kept and reported by [DatabaseBuilder::open];
/// later settings are ignored once an error is recorded.
///
/// ```rust
/// use rippledb::database::Database;
/// use std::time::Duration;
///
/// let db = Database::builder()
///     .primary_key("id")
///     .defer_threshold(500)
///     .change_debounce(Some(Duration::from_millis(50)))
///     .open()
///     .unwrap();
/// assert_eq!(db.collection("users").unwrap().primary_key(), "id");
/// ```
#[derive(Default)]
pub struct DatabaseBuilder {
    error: Option<RippleError>,
    config: DatabaseConfig,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        DatabaseBuilder {
            error: None,
            config: DatabaseConfig::new(),
        }
    }

    pub fn primary_key(self, primary_key: &str) -> Self {
        self.apply(|config| config.set_primary_key(primary_key))
    }

    pub fn defer_threshold(self, threshold: usize) -> Self {
        self.apply(|config| config.set_defer_thresholds(DeferThresholds::uniform(threshold)))
    }

    pub fn defer_thresholds(self, thresholds: DeferThresholds) -> Self {
        self.apply(|config| config.set_defer_thresholds(thresholds))
    }

    pub fn defer_interval(self, interval: Duration) -> Self {
        self.apply(|config| config.set_defer_interval(interval))
    }

    /// `None` emits change events immediately instead of debouncing them.
    pub fn change_debounce(self, window: Option<Duration>) -> Self {
        self.apply(|config| config.set_change_debounce(window))
    }

    pub fn auto_drain(self, auto_drain: bool) -> Self {
        self.apply(|config| config.set_auto_drain(auto_drain))
    }

    pub fn field_separator(self, separator: &str) -> Self {
        self.apply(|config| config.set_field_separator(separator))
    }

    pub fn register_index_kind(self, kind: IndexKind) -> Self {
        self.apply(|config| config.register_index_kind(kind))
    }

    pub fn open(self) -> RippleResult<Database> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize();
        log::debug!("Opening database with primary key {}", self.config.primary_key());
        Ok(Database::new(self.config))
    }

    fn apply(mut self, setting: impl FnOnce(&DatabaseConfig) -> RippleResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = setting(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }
}
