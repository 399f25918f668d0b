use crate::collection::Document;
use crate::common::Value;
use std::collections::HashMap;

/// The changes that turn one document set into another, matched by
/// primary key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionDiff {
    insert: Vec<Document>,
    update: Vec<Document>,
    remove: Vec<Document>,
}

impl CollectionDiff {
    /// Documents of the new set whose key the old set lacks.
    pub fn insert(&self) -> &[Document] {
        &self.insert
    }

    /// Documents of the new set that differ from the old document with the
    /// same key.
    pub fn update(&self) -> &[Document] {
        &self.update
    }

    /// Documents of the old set whose key the new set lacks.
    pub fn remove(&self) -> &[Document] {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<Document>, Vec<Document>, Vec<Document>) {
        (self.insert, self.update, self.remove)
    }
}

/// Compares two document sequences keyed by `primary_key`. Documents
/// without the key are ignored.
pub(crate) fn diff_documents(primary_key: &str, old: &[Document], new: &[Document]) -> CollectionDiff {
    let old_by_key: HashMap<&Value, &Document> = old
        .iter()
        .filter_map(|document| document.get(primary_key).map(|key| (key, document)))
        .collect();
    let new_by_key: HashMap<&Value, &Document> = new
        .iter()
        .filter_map(|document| document.get(primary_key).map(|key| (key, document)))
        .collect();

    let mut diff = CollectionDiff::default();
    for document in new {
        let Some(key) = document.get(primary_key) else {
            continue;
        };
        match old_by_key.get(key) {
            Some(existing) if *existing != document => diff.update.push(document.clone()),
            Some(_) => {}
            None => diff.insert.push(document.clone()),
        }
    }

    diff.remove = old
        .iter()
        .filter(|document| {
            document
                .get(primary_key)
                .is_some_and(|key| !new_by_key.contains_key(key))
        })
        .cloned()
        .collect();
    diff
}
