use crate::collection::{Document, Join};
use icu_collator::options::CollatorOptions;
use icu_collator::CollatorPreferences;
use std::fmt::{Debug, Formatter};

/// Options for controlling find operations on documents.
///
/// `FindOptions` specifies sorting, pagination, joins and whether indexes
/// may be used. It supports method chaining for convenient configuration.
///
/// The sort specifier is a document of `path: direction` pairs, evaluated in
/// field order, where `-1` sorts descending and any other value ascending.
///
/// # Examples
///
/// ```rust,ignore
/// use rippledb::collection::{limit_to, order_by, skip_by, FindOptions};
/// use rippledb::doc;
///
/// // Sort by age descending, then name, and page through the results
/// let options = FindOptions::new()
///     .sort(doc! { age: (-1), name: 1 })
///     .skip(10)
///     .limit(20);
///
/// // Use convenience functions
/// let options = order_by(doc! { name: 1 });
/// let options = skip_by(5);
/// let options = limit_to(100);
/// ```
#[derive(Clone, Default)]
pub struct FindOptions {
    pub(crate) sort: Option<Document>,
    pub(crate) skip: Option<usize>,
    pub(crate) limit: Option<usize>,
    pub(crate) skip_index: bool,
    pub(crate) joins: Vec<Join>,
    pub(crate) collator_options: Option<CollatorOptions>,
    pub(crate) collator_preferences: Option<CollatorPreferences>,
}

impl Debug for FindOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindOptions")
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("skip_index", &self.skip_index)
            .field("joins", &self.joins)
            .finish()
    }
}

/// Creates `FindOptions` sorting by the given specifier.
///
/// # Arguments
///
/// * `sort` - A document such as `{age: 1, name: -1}`
pub fn order_by(sort: Document) -> FindOptions {
    FindOptions::new().sort(sort)
}

/// Creates `FindOptions` that skips a number of results.
///
/// Useful for pagination: skip the first N results and process the remaining.
pub fn skip_by(skip: usize) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limits the number of results.
///
/// Combined with skip for pagination: skip(10).limit(20) returns results 11-30.
pub fn limit_to(limit: usize) -> FindOptions {
    FindOptions::new().limit(limit)
}

/// Creates `FindOptions` that evaluate the query with a full table scan,
/// ignoring every secondary index.
pub fn without_index() -> FindOptions {
    FindOptions::new().skip_index(true)
}

/// Creates `FindOptions` with a single join.
pub fn join_with(join: Join) -> FindOptions {
    FindOptions::new().join(join)
}

impl FindOptions {
    /// Creates a new `FindOptions` with default settings.
    ///
    /// By default no sort, skip or limit is applied, indexes are used when
    /// they cover the query and nothing is joined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort specifier.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Disables (or re-enables) the use of secondary indexes.
    pub fn skip_index(mut self, skip_index: bool) -> Self {
        self.skip_index = skip_index;
        self
    }

    /// Adds a join evaluated against every result document.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Sets the collator options used to compare strings while sorting.
    pub fn collator_options(mut self, collator_options: CollatorOptions) -> Self {
        self.collator_options = Some(collator_options);
        self
    }

    /// Sets the collator preferences (locale) used to compare strings while sorting.
    pub fn collator_preferences(mut self, collator_preferences: CollatorPreferences) -> Self {
        self.collator_preferences = Some(collator_preferences);
        self
    }

    pub fn sort_spec(&self) -> Option<&Document> {
        self.sort.as_ref()
    }

    pub fn skip_count(&self) -> Option<usize> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<usize> {
        self.limit
    }

    pub fn is_index_skipped(&self) -> bool {
        self.skip_index
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Whether results need a sort pass.
    pub(crate) fn has_sort(&self) -> bool {
        self.sort.as_ref().is_some_and(|s| !s.is_empty())
    }
}
