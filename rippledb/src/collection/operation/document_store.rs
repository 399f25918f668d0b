use crate::collection::Document;
use crate::common::{current_time_millis, Value};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::index::{IndexDescriptor, IndexStrategy, PrimaryIndex};
use indexmap::IndexMap;
use std::collections::HashMap;

/// The documents of one collection together with every index over them.
///
/// All writes go through here so the primary index and the secondary
/// indexes never disagree: a write is checked against every index before
/// any of them is touched.
pub(crate) struct DocumentStore {
    primary: PrimaryIndex,
    indexes: IndexMap<String, Box<dyn IndexStrategy>>,
    names_by_id: HashMap<String, String>,
    last_change: u128,
}

impl DocumentStore {
    pub fn new(primary_key: &str) -> Self {
        DocumentStore {
            primary: PrimaryIndex::new(primary_key),
            indexes: IndexMap::new(),
            names_by_id: HashMap::new(),
            last_change: 0,
        }
    }

    pub fn primary(&self) -> &PrimaryIndex {
        &self.primary
    }

    pub fn primary_key(&self) -> &str {
        self.primary.primary_key()
    }

    pub fn indexes(&self) -> impl Iterator<Item = &dyn IndexStrategy> {
        self.indexes.values().map(|index| index.as_ref())
    }

    pub fn index(&self, name: &str) -> Option<&dyn IndexStrategy> {
        self.indexes.get(name).map(|index| index.as_ref())
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn get(&self, key: &Value) -> Option<&Document> {
        self.primary.get(key)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.primary.documents()
    }

    pub fn last_change(&self) -> u128 {
        self.last_change
    }

    pub fn set_last_change(&mut self, last_change: u128) {
        self.last_change = last_change;
    }

    pub fn touch(&mut self) {
        self.last_change = current_time_millis();
    }

    /// Stores a new document, appended or at `position` of the sequence.
    pub fn insert(&mut self, document: Document, position: Option<usize>) -> RippleResult<Value> {
        let key = self.primary.check(&document)?;
        for index in self.indexes.values() {
            index.check(&key, &document)?;
        }

        let mut indexed = 0;
        let mut failure = None;
        for index in self.indexes.values_mut() {
            if let Err(e) = index.insert(&key, &document) {
                failure = Some(e);
                break;
            }
            indexed += 1;
        }
        if let Some(e) = failure {
            self.unindex(&key, &document, indexed);
            return Err(e);
        }

        match position {
            Some(position) => self.primary.insert_at(position, document)?,
            None => self.primary.insert(document)?,
        };
        Ok(key)
    }

    /// Replaces the document stored under `key`.
    ///
    /// The replacement may carry a new primary key. When any index rejects
    /// it the stored document and its index entries stay as they were.
    pub fn replace(&mut self, key: &Value, document: Document) -> RippleResult<()> {
        let Some(current) = self.primary.get(key).cloned() else {
            log::error!("No document with primary key {} to replace", key);
            return Err(RippleError::new(
                &format!("No document with primary key {} to replace", key),
                ErrorKind::InternalError,
            ));
        };

        let new_key = match self.primary.key_of(&document) {
            Some(new_key) => new_key,
            None => {
                log::error!("Updated document lost its primary key field {}", self.primary_key());
                return Err(RippleError::new(
                    &format!("Updated document lost its primary key field {}", self.primary_key()),
                    ErrorKind::MissingArgument,
                ));
            }
        };
        if new_key != *key && self.primary.contains(&new_key) {
            let message = format!("Primary key violation on {}: {} already exists", self.primary_key(), new_key);
            log::error!("{}", message);
            return Err(RippleError::new(&message, ErrorKind::PrimaryKeyViolation));
        }

        for index in self.indexes.values_mut() {
            index.remove(key, &current);
        }
        let checked = self.indexes.values().try_for_each(|index| index.check(&new_key, &document));
        if let Err(e) = checked {
            self.reindex(key, &current);
            return Err(e);
        }
        for index in self.indexes.values_mut() {
            index.insert(&new_key, &document)?;
        }
        self.primary.replace(key, document)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Document> {
        let document = self.primary.remove(key)?;
        for index in self.indexes.values_mut() {
            index.remove(key, &document);
        }
        Some(document)
    }

    pub fn clear(&mut self) {
        self.primary.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    /// Replaces every document, keeping the indexes.
    ///
    /// Returns the previous documents. On a violation the previous data is
    /// restored and the error returned.
    pub fn replace_all(&mut self, documents: Vec<Document>) -> RippleResult<Vec<Document>> {
        let old: Vec<Document> = self.primary.documents().cloned().collect();
        self.clear();
        for document in documents {
            if let Err(e) = self.insert(document, None) {
                log::error!("Failed to load data: {}, restoring previous data", e);
                self.restore(old);
                return Err(e);
            }
        }
        Ok(old)
    }

    /// Rebuilds the primary index on another key field.
    pub fn rekey(&mut self, primary_key: &str) -> RippleResult<()> {
        let mut primary = PrimaryIndex::new(primary_key);
        for document in self.primary.documents() {
            primary.insert(document.clone())?;
        }

        let documents: Vec<Document> = primary.documents().cloned().collect();
        let keys: Vec<Value> = primary.keys().cloned().collect();
        for index in self.indexes.values_mut() {
            index.clear();
            for (key, document) in keys.iter().zip(&documents) {
                index.insert(key, document)?;
            }
        }
        self.primary = primary;
        Ok(())
    }

    /// Adds an index and fills it from the stored documents.
    ///
    /// An index with the same key shape is returned instead of adding a
    /// second one.
    pub fn add_index(&mut self, mut index: Box<dyn IndexStrategy>) -> RippleResult<IndexDescriptor> {
        let descriptor = index.descriptor().clone();
        if let Some(existing) = self
            .names_by_id
            .get(descriptor.id())
            .and_then(|name| self.indexes.get(name))
        {
            log::debug!("Index {} already covers {}", existing.descriptor().name(), descriptor.id());
            return Ok(existing.descriptor().clone());
        }
        if self.indexes.contains_key(descriptor.name()) {
            log::error!("Index {} already exists with a different key shape", descriptor.name());
            return Err(RippleError::new(
                &format!("Index {} already exists with a different key shape", descriptor.name()),
                ErrorKind::IndexAlreadyExists,
            ));
        }

        for (key, document) in self.primary.keys().zip(self.primary.documents()) {
            index.check(key, document)?;
            index.insert(key, document)?;
        }

        self.names_by_id
            .insert(descriptor.id().to_string(), descriptor.name().to_string());
        self.indexes.insert(descriptor.name().to_string(), index);
        Ok(descriptor)
    }

    pub fn drop_index(&mut self, name: &str) -> RippleResult<IndexDescriptor> {
        match self.indexes.shift_remove(name) {
            Some(index) => {
                let descriptor = index.descriptor().clone();
                self.names_by_id.remove(descriptor.id());
                Ok(descriptor)
            }
            None => {
                log::error!("Index {} does not exist", name);
                Err(RippleError::new(
                    &format!("Index {} does not exist", name),
                    ErrorKind::IndexNotFound,
                ))
            }
        }
    }

    fn unindex(&mut self, key: &Value, document: &Document, count: usize) {
        for index in self.indexes.values_mut().take(count) {
            index.remove(key, document);
        }
    }

    fn reindex(&mut self, key: &Value, document: &Document) {
        for index in self.indexes.values_mut() {
            if let Err(e) = index.insert(key, document) {
                log::error!("Failed to restore index entry for {}: {}", key, e);
            }
        }
    }

    fn restore(&mut self, documents: Vec<Document>) {
        self.clear();
        for document in documents {
            if let Err(e) = self.insert(document, None) {
                log::error!("Failed to restore document: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::index::{keyed_index_kind, IndexDescriptor};

    fn age_index(unique: bool) -> Box<dyn IndexStrategy> {
        let descriptor = IndexDescriptor::new(None, &doc! { age: 1 }, unique, "keyed").unwrap();
        keyed_index_kind().create_index(descriptor).unwrap()
    }

    fn loaded() -> DocumentStore {
        let mut store = DocumentStore::new("_id");
        store.insert(doc! { _id: "1", age: 10 }, None).unwrap();
        store.insert(doc! { _id: "2", age: 20 }, None).unwrap();
        store
    }

    #[test]
    fn test_insert_checks_every_index_first() {
        let mut store = loaded();
        store.add_index(age_index(true)).unwrap();

        let result = store.insert(doc! { _id: "3", age: 10 }, None);
        assert_eq!(result.err().map(|e| e.kind().clone()), Some(ErrorKind::IndexViolation));
        assert_eq!(store.len(), 2);
        assert_eq!(store.index("age_1").map(|i| i.size()), Some(2));
    }

    #[test]
    fn test_replace_restores_on_violation() {
        let mut store = loaded();
        store.add_index(age_index(true)).unwrap();

        let result = store.replace(&Value::from("2"), doc! { _id: "2", age: 10 });
        assert_eq!(result.err().map(|e| e.kind().clone()), Some(ErrorKind::IndexViolation));
        assert_eq!(store.get(&Value::from("2")), Some(&doc! { _id: "2", age: 20 }));
        let index = store.index("age_1").unwrap();
        assert_eq!(index.lookup(&doc! { age: 20 }), vec![Value::from("2")]);

        store.replace(&Value::from("2"), doc! { _id: "2", age: 30 }).unwrap();
        let index = store.index("age_1").unwrap();
        assert!(index.lookup(&doc! { age: 20 }).is_empty());
        assert_eq!(index.lookup(&doc! { age: 30 }), vec![Value::from("2")]);
    }

    #[test]
    fn test_replace_rejects_taken_primary_key() {
        let mut store = loaded();
        let result = store.replace(&Value::from("2"), doc! { _id: "1", age: 20 });
        assert_eq!(result.err().map(|e| e.kind().clone()), Some(ErrorKind::PrimaryKeyViolation));
    }

    #[test]
    fn test_add_index_same_shape_returns_existing() {
        let mut store = loaded();
        let first = store.add_index(age_index(false)).unwrap();
        let second = store.add_index(age_index(false)).unwrap();
        assert_eq!(first.name(), second.name());
        assert_eq!(store.indexes().count(), 1);

        let clash = IndexDescriptor::new(Some("age_1"), &doc! { name: 1 }, false, "keyed").unwrap();
        let result = store.add_index(keyed_index_kind().create_index(clash).unwrap());
        assert_eq!(result.err().map(|e| e.kind().clone()), Some(ErrorKind::IndexAlreadyExists));
    }

    #[test]
    fn test_add_unique_index_over_duplicates_fails() {
        let mut store = loaded();
        store.insert(doc! { _id: "3", age: 20 }, None).unwrap();
        let result = store.add_index(age_index(true));
        assert_eq!(result.err().map(|e| e.kind().clone()), Some(ErrorKind::IndexViolation));
        assert_eq!(store.indexes().count(), 0);
    }

    #[test]
    fn test_replace_all_restores_on_violation() {
        let mut store = loaded();
        let result = store.replace_all(vec![doc! { _id: "9" }, doc! { _id: "9" }]);
        assert!(result.is_err());
        assert_eq!(store.len(), 2);

        let old = store.replace_all(vec![doc! { _id: "9" }]).unwrap();
        assert_eq!(old.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rekey() {
        let mut store = DocumentStore::new("_id");
        store.insert(doc! { _id: "1", code: "a" }, None).unwrap();
        store.insert(doc! { _id: "2", code: "b" }, None).unwrap();
        store.rekey("code").unwrap();
        assert_eq!(store.primary_key(), "code");
        assert!(store.get(&Value::from("a")).is_some());

        store.insert(doc! { _id: "3", code: "a" }, None).unwrap_err();
        assert!(store.rekey("missing").is_err());
        assert_eq!(store.primary_key(), "code");
    }

    #[test]
    fn test_drop_index() {
        let mut store = loaded();
        store.add_index(age_index(false)).unwrap();
        assert!(store.drop_index("age_1").is_ok());
        assert_eq!(
            store.drop_index("age_1").err().map(|e| e.kind().clone()),
            Some(ErrorKind::IndexNotFound)
        );
    }
}
