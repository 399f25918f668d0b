use crate::collection::Document;
use crate::errors::{ErrorKind, RippleError};

/// A document an insert rejected, with the reason.
#[derive(Debug, Clone)]
pub struct FailedInsert {
    document: Document,
    reason: String,
    kind: ErrorKind,
}

impl FailedInsert {
    pub(crate) fn new(document: Document, error: &RippleError) -> Self {
        FailedInsert {
            document,
            reason: error.message().to_string(),
            kind: error.kind().clone(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

/// The result of an insert.
///
/// Violations never abort a batch: every document lands either in
/// `inserted` or in `failed`. A batch larger than the collection's insert
/// threshold is queued instead and reported through `deferred`; its final
/// result reaches the callback of
/// [insert_with_callback](crate::collection::Collection::insert_with_callback).
///
/// # Examples
///
/// ```rust,ignore
/// let result = users.insert(vec![doc! { _id: "1" }, doc! { _id: "1" }])?;
/// assert_eq!(result.inserted().len(), 1);
/// assert_eq!(result.failed()[0].kind(), &ErrorKind::PrimaryKeyViolation);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InsertResult {
    inserted: Vec<Document>,
    failed: Vec<FailedInsert>,
    deferred: usize,
}

impl InsertResult {
    pub(crate) fn new(inserted: Vec<Document>, failed: Vec<FailedInsert>) -> Self {
        InsertResult {
            inserted,
            failed,
            deferred: 0,
        }
    }

    pub(crate) fn deferred(count: usize) -> Self {
        InsertResult {
            inserted: vec![],
            failed: vec![],
            deferred: count,
        }
    }

    pub(crate) fn merge(&mut self, other: InsertResult) {
        self.inserted.extend(other.inserted);
        self.failed.extend(other.failed);
    }

    /// The documents stored, with generated primary keys filled in.
    pub fn inserted(&self) -> &[Document] {
        &self.inserted
    }

    pub fn failed(&self) -> &[FailedInsert] {
        &self.failed
    }

    /// Number of documents queued for later insertion.
    pub fn deferred_count(&self) -> usize {
        self.deferred
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred > 0
    }
}

/// What an upsert did with its document.
#[derive(Debug, Clone)]
pub enum UpsertResult {
    Inserted(InsertResult),
    /// The documents after the update; empty when nothing changed.
    Updated(Vec<Document>),
}

impl UpsertResult {
    pub fn is_insert(&self) -> bool {
        matches!(self, UpsertResult::Inserted(_))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, UpsertResult::Updated(_))
    }
}
