use crate::collection::Document;
use crate::common::Value;
use crate::errors::RippleResult;
use crate::index::IndexDescriptor;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// How much of a query an index can answer.
///
/// `matched_key_count` is the number of the index's key paths the query
/// constrains in a way the index can evaluate, `total_key_count` the number
/// of leaf keys in the query. An index matching every key fully resolves the
/// query without a residual scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexCoverage {
    pub matched_key_count: usize,
    pub total_key_count: usize,
}

impl IndexCoverage {
    pub fn new(matched_key_count: usize, total_key_count: usize) -> Self {
        IndexCoverage {
            matched_key_count,
            total_key_count,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.matched_key_count > 0
    }

    pub fn is_full(&self) -> bool {
        self.is_usable() && self.matched_key_count == self.total_key_count
    }
}

/// A live index over the documents of one collection.
///
/// Implementations map key values extracted from documents to primary keys.
/// The owning collection calls [IndexStrategy::check] before any write that
/// could violate the index, so `insert` is only reached for documents known
/// to fit.
pub trait IndexStrategy: Send + Sync {
    fn descriptor(&self) -> &IndexDescriptor;

    /// Reports how much of `query` this index can evaluate.
    fn coverage(&self, query: &Document) -> IndexCoverage;

    /// Returns the primary keys of the documents satisfying the covered
    /// part of `query`. The result is a superset of the true matches when
    /// coverage is partial or the index is multikey.
    fn lookup(&self, query: &Document) -> Vec<Value>;

    /// Verifies that `document` could be inserted under `primary_key`.
    fn check(&self, primary_key: &Value, document: &Document) -> RippleResult<()>;

    fn insert(&mut self, primary_key: &Value, document: &Document) -> RippleResult<()>;

    fn remove(&mut self, primary_key: &Value, document: &Document);

    fn clear(&mut self);

    /// Number of distinct keys stored.
    fn size(&self) -> usize;

    /// Whether some document produced more than one key (array fan-out).
    /// Results of a multikey index always need a residual scan.
    fn is_multikey(&self) -> bool;
}

/// Factory for one kind of index, such as the default `keyed` kind.
///
/// Additional kinds are registered on the database builder and chosen per
/// index through `ensure_index` options.
pub trait IndexKindProvider: Send + Sync {
    fn kind_name(&self) -> String;

    /// Rejects descriptors this kind cannot serve, e.g. a spatial kind
    /// refusing compound keys.
    fn validate(&self, descriptor: &IndexDescriptor) -> RippleResult<()>;

    fn create_index(&self, descriptor: IndexDescriptor) -> RippleResult<Box<dyn IndexStrategy>>;
}

/// Shareable handle to an [IndexKindProvider].
#[derive(Clone)]
pub struct IndexKind {
    inner: Arc<dyn IndexKindProvider>,
}

impl IndexKind {
    pub fn new<T: IndexKindProvider + 'static>(inner: T) -> Self {
        IndexKind { inner: Arc::new(inner) }
    }
}

impl Deref for IndexKind {
    type Target = Arc<dyn IndexKindProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IndexKind({})", self.inner.kind_name())
    }
}
