/// Options for controlling how an update document is applied.
///
/// `$addToSet` decides whether an item is already present by comparing the
/// whole value. Setting `add_to_set_key` makes it compare only the value found
/// at that path inside each element instead.
///
/// # Examples
///
/// ```rust
/// use rippledb::collection::{add_to_set_by, UpdateOptions};
///
/// let options = add_to_set_by("sku");
/// assert_eq!(options.add_to_set_key(), Some("sku"));
/// assert_eq!(UpdateOptions::default().add_to_set_key(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    add_to_set_key: Option<String>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path `$addToSet` compares elements by.
    pub fn with_add_to_set_key(mut self, key: &str) -> Self {
        self.add_to_set_key = Some(key.to_string());
        self
    }

    pub fn add_to_set_key(&self) -> Option<&str> {
        self.add_to_set_key.as_deref()
    }
}

/// Creates `UpdateOptions` where `$addToSet` compares elements by `key`.
pub fn add_to_set_by(key: &str) -> UpdateOptions {
    UpdateOptions::new().with_add_to_set_key(key)
}
