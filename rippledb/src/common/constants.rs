// document constants
pub const DOC_ID: &str = "_id";

// event bus constants
pub const RIPPLE_EVENT: &str = "ripple_event";

// reserved update keys
pub const POSITIONAL_MARKER: &str = "$";
pub const INDEX_KEY: &str = "$index";
pub const EACH_KEY: &str = "$each";
pub const POSITION_KEY: &str = "$position";

// defaults
pub const DEFAULT_DEFER_THRESHOLD: usize = 100;
pub const DEFAULT_DEFER_INTERVAL_MS: u64 = 1;
pub const DEFAULT_CHANGE_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_FIELD_SEPARATOR: &str = ".";
pub const DEFAULT_INDEX_KIND: &str = "keyed";

// temporary collections
pub const TEMP_COLLECTION_PREFIX: &str = "__ripple_temp_";
