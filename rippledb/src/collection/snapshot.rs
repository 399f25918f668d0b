use crate::collection::Document;

/// A point-in-time copy of a collection, for persistence layers.
///
/// `last_change` is the millisecond timestamp of the last mutation before
/// the snapshot was taken; loading a snapshot restores it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionSnapshot {
    name: String,
    primary_key: String,
    data: Vec<Document>,
    last_change: u128,
}

impl CollectionSnapshot {
    pub fn new(name: &str, primary_key: &str, data: Vec<Document>, last_change: u128) -> Self {
        CollectionSnapshot {
            name: name.to_string(),
            primary_key: primary_key.to_string(),
            data,
            last_change,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn data(&self) -> &[Document] {
        &self.data
    }

    pub fn last_change(&self) -> u128 {
        self.last_change
    }

    pub(crate) fn into_data(self) -> Vec<Document> {
        self.data
    }
}
