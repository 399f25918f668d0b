use crate::config::{DatabaseConfig, DeferThresholds};
use std::time::Duration;

/// Per-collection overrides of the database defaults.
///
/// ```rust,ignore
/// use rippledb::collection::CollectionOptions;
///
/// let options = CollectionOptions::new()
///     .primary_key("sku")
///     .defer_threshold(500)
///     .change_debounce(None);
/// let products = db.collection_with_options("products", options)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    primary_key: Option<String>,
    defer_thresholds: Option<DeferThresholds>,
    defer_interval: Option<Duration>,
    change_debounce: Option<Option<Duration>>,
    auto_drain: Option<bool>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = Some(primary_key.to_string());
        self
    }

    /// Uses the same defer threshold for every operation.
    pub fn defer_threshold(mut self, threshold: usize) -> Self {
        self.defer_thresholds = Some(DeferThresholds::uniform(threshold));
        self
    }

    pub fn defer_thresholds(mut self, thresholds: DeferThresholds) -> Self {
        self.defer_thresholds = Some(thresholds);
        self
    }

    pub fn defer_interval(mut self, interval: Duration) -> Self {
        self.defer_interval = Some(interval);
        self
    }

    pub fn change_debounce(mut self, window: Option<Duration>) -> Self {
        self.change_debounce = Some(window);
        self
    }

    pub fn auto_drain(mut self, auto_drain: bool) -> Self {
        self.auto_drain = Some(auto_drain);
        self
    }

    pub(crate) fn primary_key_override(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub(crate) fn resolve(&self, config: &DatabaseConfig) -> CollectionSettings {
        CollectionSettings {
            primary_key: self.primary_key.clone().unwrap_or_else(|| config.primary_key()),
            defer_thresholds: self.defer_thresholds.unwrap_or_else(|| config.defer_thresholds()),
            defer_interval: self.defer_interval.unwrap_or_else(|| config.defer_interval()),
            change_debounce: self.change_debounce.unwrap_or_else(|| config.change_debounce()),
            auto_drain: self.auto_drain.unwrap_or_else(|| config.auto_drain()),
            config: config.clone(),
        }
    }
}

/// Effective settings of one collection.
#[derive(Clone)]
pub(crate) struct CollectionSettings {
    pub primary_key: String,
    pub defer_thresholds: DeferThresholds,
    pub defer_interval: Duration,
    pub change_debounce: Option<Duration>,
    pub auto_drain: bool,
    pub config: DatabaseConfig,
}
