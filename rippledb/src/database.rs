use crate::chain::{CollectionGroup, View};
use crate::collection::{Collection, CollectionOptions, Document};
use crate::common::{new_object_id, object_id_from};
use crate::config::DatabaseConfig;
use crate::database_builder::DatabaseBuilder;
use crate::errors::{ErrorKind, RippleError, RippleResult};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Name and document count of a registered collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    name: String,
    count: usize,
}

impl CollectionInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// A registry of named collections, views and collection groups sharing one
/// [DatabaseConfig].
///
/// Collections are created on first reference. All clones of a database
/// share the same registry.
///
/// ```rust
/// use rippledb::database::Database;
/// use rippledb::doc;
///
/// let db = Database::builder().open().unwrap();
/// let users = db.collection("users").unwrap();
/// users.insert_one(doc! { name: "Jim" }).unwrap();
///
/// assert!(db.collection_exists("users"));
/// assert_eq!(db.collection("users").unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    pub(crate) fn new(config: DatabaseConfig) -> Self {
        Database {
            inner: Arc::new(DatabaseInner {
                config,
                collections: DashMap::new(),
                views: DashMap::new(),
                groups: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> DatabaseConfig {
        self.inner.config.clone()
    }

    /// Returns the collection named `name`, creating it with the database
    /// defaults when it does not exist yet.
    pub fn collection(&self, name: &str) -> RippleResult<Collection> {
        self.inner.collection(name, &CollectionOptions::new())
    }

    /// Like [Database::collection], creating the collection with `options`.
    /// For an existing collection only a different primary key is applied.
    pub fn collection_with_options(&self, name: &str, options: CollectionOptions) -> RippleResult<Collection> {
        self.inner.collection(name, &options)
    }

    pub fn collection_exists(&self, name: &str) -> bool {
        self.inner
            .collections
            .get(name)
            .is_some_and(|collection| !collection.is_dropped())
    }

    /// Every live collection with its document count, ordered by name.
    pub fn collections(&self) -> Vec<CollectionInfo> {
        let mut infos: Vec<CollectionInfo> = self
            .inner
            .live_collections()
            .into_iter()
            .map(|collection| CollectionInfo {
                name: collection.name(),
                count: collection.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Drops and unregisters a collection. Returns false when no collection
    /// has that name.
    pub fn drop_collection(&self, name: &str) -> RippleResult<bool> {
        self.inner.check_open()?;
        match self.inner.collections.remove(name) {
            Some((_, collection)) => {
                if !collection.is_dropped() {
                    collection.drop()?;
                }
                log::debug!("Dropped collection {}", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns the view named `name`, creating an unattached one first.
    pub fn view(&self, name: &str) -> RippleResult<View> {
        self.inner.check_open()?;
        validate_name(name)?;
        let view = self
            .inner
            .views
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Creating view {}", name);
                View::with_settings(name, CollectionOptions::new().resolve(&self.inner.config))
            })
            .clone();
        Ok(view)
    }

    pub fn view_exists(&self, name: &str) -> bool {
        self.inner.views.contains_key(name)
    }

    /// Returns the collection group named `name`, creating an empty one first.
    pub fn collection_group(&self, name: &str) -> RippleResult<CollectionGroup> {
        self.inner.check_open()?;
        validate_name(name)?;
        let group = self
            .inner
            .groups
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("Creating collection group {}", name);
                CollectionGroup::with_settings(name, CollectionOptions::new().resolve(&self.inner.config))
            })
            .clone();
        Ok(group)
    }

    pub fn collection_group_exists(&self, name: &str) -> bool {
        self.inner.groups.contains_key(name)
    }

    /// Every document of every collection whose JSON text contains `search`.
    pub fn peek(&self, search: &str) -> RippleResult<Vec<Document>> {
        let mut found = Vec::new();
        for (_, documents) in self.peek_cat(search)? {
            found.extend(documents);
        }
        Ok(found)
    }

    /// Like [Database::peek], grouped by collection name. Collections
    /// without a hit are left out.
    pub fn peek_cat(&self, search: &str) -> RippleResult<IndexMap<String, Vec<Document>>> {
        let mut collections = self.inner.live_collections();
        collections.sort_by_key(|collection| collection.name());

        let mut found = IndexMap::new();
        for collection in collections {
            let documents = collection.peek(search)?;
            if !documents.is_empty() {
                found.insert(collection.name(), documents);
            }
        }
        Ok(found)
    }

    /// A fresh random id, or the deterministic id of `source` when given.
    pub fn object_id(&self, source: Option<&str>) -> String {
        match source {
            Some(source) => object_id_from(source),
            None => new_object_id(),
        }
    }

    /// Drops every collection, view and group and closes the database.
    pub fn close(&self) -> RippleResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let views: Vec<View> = self.inner.views.iter().map(|e| e.value().clone()).collect();
        self.inner.views.clear();
        for view in views {
            view.drop()?;
        }

        let groups: Vec<CollectionGroup> = self.inner.groups.iter().map(|e| e.value().clone()).collect();
        self.inner.groups.clear();
        for group in groups {
            group.drop()?;
        }

        let collections = self.inner.live_collections();
        self.inner.collections.clear();
        for collection in collections {
            collection.drop()?;
        }
        log::debug!("Database closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
impl Default for Database {
    fn default() -> Self {
        Database::builder().open().expect("Failed to open database")
    }
}

struct DatabaseInner {
    config: DatabaseConfig,
    collections: DashMap<String, Collection>,
    views: DashMap<String, View>,
    groups: DashMap<String, CollectionGroup>,
    closed: AtomicBool,
}

impl DatabaseInner {
    fn collection(&self, name: &str, options: &CollectionOptions) -> RippleResult<Collection> {
        self.check_open()?;
        validate_name(name)?;

        let collection = {
            let mut entry = self
                .collections
                .entry(name.to_string())
                .or_insert_with(|| self.create_collection(name, options));
            if entry.is_dropped() {
                *entry = self.create_collection(name, options);
            }
            entry.clone()
        };

        if let Some(primary_key) = options.primary_key_override() {
            if collection.primary_key() != primary_key {
                collection.set_primary_key(primary_key)?;
            }
        }
        Ok(collection)
    }

    fn create_collection(&self, name: &str, options: &CollectionOptions) -> Collection {
        log::debug!("Creating collection {}", name);
        Collection::with_settings(name, options.resolve(&self.config))
    }

    fn live_collections(&self) -> Vec<Collection> {
        self.collections
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|collection| !collection.is_dropped())
            .collect()
    }

    fn check_open(&self) -> RippleResult<()> {
        if self.closed.load(Ordering::Acquire) {
            log::error!("Database is already closed");
            return Err(RippleError::new("Database is already closed", ErrorKind::InvalidOperation));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> RippleResult<()> {
    if name.trim().is_empty() {
        log::error!("Name cannot be empty");
        return Err(RippleError::new("Name cannot be empty", ErrorKind::MissingArgument));
    }
    Ok(())
}
