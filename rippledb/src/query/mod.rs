//! Query language: parsing query documents and matching them against documents.
//!
//! A query is a document whose keys are field names or `$` operators:
//!
//! ```rust,ignore
//! doc! {
//!     age: { "$gte": 18 },
//!     "$or": [{ city: "London" }, { tags: "remote" }],
//!     name: { "$regex": "^al", "$options": "i" },
//! }
//! ```
//!
//! Supported operators are `$gt`, `$gte`, `$lt`, `$lte`, `$eq`, `$ne`,
//! `$exists`, `$in`, `$nin`, `$or`, `$and` and `$regex` (with `$options`).

mod matcher;
mod operators;

pub use matcher::*;
pub use operators::*;
