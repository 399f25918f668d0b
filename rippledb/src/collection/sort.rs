use crate::collection::{Document, FindOptions};
use crate::common::{Path, SortOrder, Value};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use std::cmp::Ordering;

/// Orders documents by a sort specifier such as `{age: 1, name: -1}`.
///
/// A single key sorts directly with the comparator. Several keys bucket the
/// sequence by the leading key and sort each bucket by the remaining keys,
/// so documents equal on every key keep their incoming order.
pub(crate) struct DocumentSorter {
    keys: Vec<(Path, SortOrder)>,
    collator: Option<CollatorBorrowed<'static>>,
}

impl DocumentSorter {
    pub fn new(options: &FindOptions) -> RippleResult<Self> {
        let keys = options
            .sort
            .as_ref()
            .map(|spec| {
                Path::parse(spec)
                    .into_iter()
                    .map(|leaf| (Path::new(&leaf.path), SortOrder::from_value(&leaf.value)))
                    .collect()
            })
            .unwrap_or_default();

        let preferences = options.collator_preferences.clone().unwrap_or(CollatorPreferences::default());
        let collator_options = options.collator_options.clone().unwrap_or(CollatorOptions::default());
        let collator = Collator::try_new(preferences, collator_options).map_err(|e| {
            log::error!("Failed to create collator for sorting: {:?}", e);
            RippleError::new(
                "Failed to create collator for sorting - check collator preferences and options",
                ErrorKind::InvalidOperation,
            )
        })?;

        Ok(DocumentSorter {
            keys,
            collator: Some(collator),
        })
    }

    /// A sorter comparing strings by code point, without a collator.
    #[cfg(test)]
    pub fn plain(spec: &Document) -> Self {
        DocumentSorter {
            keys: Path::parse(spec)
                .into_iter()
                .map(|leaf| (Path::new(&leaf.path), SortOrder::from_value(&leaf.value)))
                .collect(),
            collator: None,
        }
    }

    pub fn sort(&self, documents: Vec<Document>) -> Vec<Document> {
        match self.keys.len() {
            0 => documents,
            1 => {
                let mut documents = documents;
                let (path, order) = &self.keys[0];
                documents.sort_by(|a, b| order.apply(self.compare(path.value(a), path.value(b))));
                documents
            }
            _ => self.bucket_sort(documents, 0),
        }
    }

    fn bucket_sort(&self, mut documents: Vec<Document>, level: usize) -> Vec<Document> {
        let Some((path, order)) = self.keys.get(level) else {
            return documents;
        };
        if documents.len() < 2 {
            return documents;
        }

        documents.sort_by(|a, b| order.apply(self.compare(path.value(a), path.value(b))));
        if level + 1 == self.keys.len() {
            return documents;
        }

        let mut sorted = Vec::with_capacity(documents.len());
        let mut bucket: Vec<Document> = Vec::new();
        for document in documents {
            let same_bucket = bucket
                .last()
                .map_or(true, |last| self.compare(path.value(last), path.value(&document)) == Ordering::Equal);
            if !same_bucket {
                sorted.extend(self.bucket_sort(std::mem::take(&mut bucket), level + 1));
            }
            bucket.push(document);
        }
        sorted.extend(self.bucket_sort(bucket, level + 1));
        sorted
    }

    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Compares two documents key by key, the order [DocumentSorter::sort]
    /// produces.
    pub fn compare_documents(&self, a: &Document, b: &Document) -> Ordering {
        for (path, order) in &self.keys {
            let ordering = order.apply(self.compare(path.value(a), path.value(b)));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Absent values sort before everything, null next. Strings use the
    /// collator, numbers compare numerically and mixed types by type rank.
    pub fn compare(&self, a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(Value::String(a)), Some(Value::String(b))) => match &self.collator {
                Some(collator) => collator.compare(a, b),
                None => a.cmp(b),
            },
            (Some(a), Some(b)) => a.compare_relational(b).unwrap_or_else(|| a.cmp(b)),
        }
    }
}
