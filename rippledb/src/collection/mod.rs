//! Collections and everything a find or a write on them involves.
//!
//! - [Collection] owns the documents, the primary index and the secondary
//!   indexes, and forwards its mutations into the propagation graph
//! - [FindOptions] and [Join] shape reads; [FindPlan] explains them
//! - [CollectionOptions] overrides the database defaults per collection
//! - [CollectionEventListener] observes [CollectionEvents]

mod collection_options;
mod diff;
mod document;
mod event;
mod find_options;
mod find_plan;
mod join;
pub(crate) mod operation;
mod ripple_collection;
mod snapshot;
pub(crate) mod sort;
mod transform;
mod update_options;

pub use collection_options::CollectionOptions;
pub(crate) use collection_options::CollectionSettings;
pub use diff::CollectionDiff;
pub(crate) use diff::diff_documents;
pub use document::*;
pub use event::*;
pub use find_options::*;
pub use find_plan::*;
pub use join::*;
pub use operation::{FailedInsert, InsertResult, UpsertResult};
pub use ripple_collection::*;
pub use snapshot::*;
pub use transform::*;
pub use update_options::*;
