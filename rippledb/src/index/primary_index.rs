use crate::collection::Document;
use crate::common::{Path, Value};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::index::{IndexCoverage, KeyBounds};
use indexmap::IndexMap;

/// The always-present unique index on a collection's primary key.
///
/// It also owns the collection's documents: entries are kept in insertion
/// order, so iterating the index yields the collection's document sequence
/// and a primary-key lookup is a single hash probe.
#[derive(Debug, Clone)]
pub struct PrimaryIndex {
    primary_key: String,
    documents: IndexMap<Value, Document>,
}

impl PrimaryIndex {
    pub fn new(primary_key: &str) -> Self {
        PrimaryIndex {
            primary_key: primary_key.to_string(),
            documents: IndexMap::new(),
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Reads the primary-key value of a document.
    pub fn key_of(&self, document: &Document) -> Option<Value> {
        document.get(&self.primary_key).cloned()
    }

    fn violation(&self, key: &Value) -> RippleError {
        let message = format!("Primary key violation on {}: {} already exists", self.primary_key, key);
        log::error!("{}", message);
        RippleError::new(&message, ErrorKind::PrimaryKeyViolation)
    }

    fn require_key(&self, document: &Document) -> RippleResult<Value> {
        self.key_of(document).ok_or_else(|| {
            log::error!("Document has no primary key field {}", self.primary_key);
            RippleError::new(
                &format!("Document has no primary key field {}", self.primary_key),
                ErrorKind::MissingArgument,
            )
        })
    }

    pub fn check(&self, document: &Document) -> RippleResult<Value> {
        let key = self.require_key(document)?;
        if self.documents.contains_key(&key) {
            return Err(self.violation(&key));
        }
        Ok(key)
    }

    /// Appends a document, rejecting a key that already exists.
    pub fn insert(&mut self, document: Document) -> RippleResult<Value> {
        let key = self.check(&document)?;
        self.documents.insert(key.clone(), document);
        Ok(key)
    }

    /// Inserts a document at a position of the sequence; past the end appends.
    pub fn insert_at(&mut self, index: usize, document: Document) -> RippleResult<Value> {
        let key = self.check(&document)?;
        let index = index.min(self.documents.len());
        self.documents.shift_insert(index, key.clone(), document);
        Ok(key)
    }

    /// Replaces the document stored under `key`, keeping its position.
    ///
    /// When the replacement carries a different primary key the entry is
    /// re-keyed in place, unless that key is already taken.
    pub fn replace(&mut self, key: &Value, document: Document) -> RippleResult<()> {
        let new_key = self.require_key(&document)?;
        let Some(position) = self.documents.get_index_of(key) else {
            return Err(RippleError::new(
                &format!("No document with primary key {}", key),
                ErrorKind::InternalError,
            ));
        };

        if new_key == *key {
            self.documents.insert(new_key, document);
            return Ok(());
        }

        if self.documents.contains_key(&new_key) {
            return Err(self.violation(&new_key));
        }
        self.documents.shift_remove_index(position);
        self.documents.shift_insert(position, new_key, document);
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Option<Document> {
        self.documents.shift_remove(key)
    }

    pub fn get(&self, key: &Value) -> Option<&Document> {
        self.documents.get(key)
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.documents.contains_key(key)
    }

    /// Position of a document in the collection's sequence.
    pub fn position(&self, key: &Value) -> Option<usize> {
        self.documents.get_index_of(key)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    /// The primary key is answerable when queried by a scalar, `$eq` or `$in`.
    fn bounds_of(&self, query: &Document) -> Option<KeyBounds> {
        let test = Path::new(&self.primary_key).value(query)?;
        match KeyBounds::from_test(test)? {
            KeyBounds::Range { .. } => None,
            bounds => Some(bounds),
        }
    }

    pub fn coverage(&self, query: &Document) -> IndexCoverage {
        let matched = usize::from(self.bounds_of(query).is_some());
        IndexCoverage::new(matched, Path::count_keys(query))
    }

    pub fn lookup(&self, query: &Document) -> Vec<Value> {
        let candidates = match self.bounds_of(query) {
            Some(KeyBounds::Equals(key)) => vec![key],
            Some(KeyBounds::AnyOf(keys)) => keys,
            _ => return vec![],
        };

        let mut found: Vec<Value> = candidates.into_iter().filter(|k| self.documents.contains_key(k)).collect();
        found.sort_by_key(|k| self.documents.get_index_of(k));
        found.dedup();
        found
    }
}
