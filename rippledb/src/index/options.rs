use crate::common::DEFAULT_INDEX_KIND;

/// Specifies how `ensure_index` creates an index.
///
/// # Usage
///
/// ```rust
/// use rippledb::index::{non_unique_index, unique_index, IndexOptions};
///
/// let by_email = unique_index().with_name("by_email");
/// assert!(by_email.is_unique());
/// assert_eq!(by_email.name(), Some("by_email"));
///
/// let spatial = IndexOptions::new("geohash", false);
/// assert_eq!(spatial.kind(), "geohash");
/// assert!(!non_unique_index().is_unique());
/// ```
#[derive(Debug, Clone)]
pub struct IndexOptions {
    name: Option<String>,
    unique: bool,
    kind: String,
}

impl IndexOptions {
    /// Creates options for an index of the given registered kind.
    pub fn new(kind: &str, unique: bool) -> IndexOptions {
        IndexOptions {
            name: None,
            unique,
            kind: kind.to_string(),
        }
    }

    /// Names the index. Without a name one is derived from the key paths.
    pub fn with_name(mut self, name: &str) -> IndexOptions {
        self.name = Some(name.to_string());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl Default for IndexOptions {
    /// A non-unique index of the default kind.
    fn default() -> Self {
        IndexOptions::new(DEFAULT_INDEX_KIND, false)
    }
}

/// Options for a unique index of the default kind.
pub fn unique_index() -> IndexOptions {
    IndexOptions::new(DEFAULT_INDEX_KIND, true)
}

/// Options for a non-unique index of the default kind.
pub fn non_unique_index() -> IndexOptions {
    IndexOptions::new(DEFAULT_INDEX_KIND, false)
}
