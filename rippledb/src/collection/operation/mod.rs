mod deferred_queue;
mod document_store;
mod find_optimizer;
mod read_operations;
mod write_result;

pub(crate) use deferred_queue::*;
pub(crate) use document_store::*;
pub(crate) use find_optimizer::*;
pub(crate) use read_operations::*;
pub use write_result::*;
