use crate::collection::{Collection, Document};
use crate::common::{Path, Value};

/// Joins documents of another collection into find results.
///
/// Every `on` pair names a field of the joined collection and the path of
/// the value it must equal in the result document. Matches are attached
/// under the joined collection's name, or under `as_key` when given: the
/// first match by default, all matches as an array with `multi`. With
/// `require`, result documents without a match are dropped.
///
/// ```rust,ignore
/// let options = FindOptions::new().join(
///     Join::new(&orders)
///         .on("customerId", "_id")
///         .as_key("orders")
///         .multi(true),
/// );
/// let customers = customers.find_with_options(&doc! {}, &options)?;
/// ```
///
/// A query key naming the join result (`{"orders.total": {"$gt": 5}}`)
/// constrains the joined documents instead of the base collection, and
/// result documents without a constrained match are dropped.
#[derive(Debug, Clone)]
pub struct Join {
    collection: Collection,
    on: Vec<(String, String)>,
    as_key: Option<String>,
    multi: bool,
    require: bool,
}

impl Join {
    pub fn new(collection: &Collection) -> Self {
        Join {
            collection: collection.clone(),
            on: Vec::new(),
            as_key: None,
            multi: false,
            require: false,
        }
    }

    /// Requires the joined document's `target_field` to equal the value at
    /// `source_path` in the result document.
    pub fn on(mut self, target_field: &str, source_path: &str) -> Self {
        self.on.push((target_field.to_string(), source_path.to_string()));
        self
    }

    pub fn as_key(mut self, key: &str) -> Self {
        self.as_key = Some(key.to_string());
        self
    }

    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    pub fn require(mut self, require: bool) -> Self {
        self.require = require;
        self
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Key the matches are stored under in result documents.
    pub fn result_key(&self) -> String {
        self.as_key.clone().unwrap_or_else(|| self.collection.name())
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn is_required(&self) -> bool {
        self.require
    }

    /// Builds the query selecting the joined documents of `row`.
    ///
    /// Returns `None` when a source path does not resolve, as nothing can
    /// match then.
    pub(crate) fn search_for(&self, row: &Document) -> Option<Document> {
        let mut search = Document::new();
        for (target, source) in &self.on {
            let value = Path::new(source).value(row)?;
            search.put(target.as_str(), value.clone());
        }
        Some(search)
    }

    /// Stores the matches of a row under the result key. A single join
    /// without a match leaves the row untouched.
    pub(crate) fn attach(&self, row: &mut Document, mut matches: Vec<Document>) {
        let key = self.result_key();
        if self.multi {
            row.put(key, Value::Array(matches.into_iter().map(Value::Document).collect()));
        } else if !matches.is_empty() {
            row.put(key, matches.swap_remove(0));
        }
    }
}
