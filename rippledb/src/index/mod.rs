//! Indexing support for faster queries.
//!
//! Every collection carries a [PrimaryIndex] on its primary-key field, which
//! also holds the collection's documents in insertion order. Secondary
//! indexes are created with `ensure_index` and come from an [IndexKind]:
//!
//! - **keyed** (default): an ordered map over key tuples answering equality,
//!   `$in` and range tests, unique or non-unique, with array fan-out.
//! - custom kinds implement [IndexKindProvider] and are registered on the
//!   database builder.
//!
//! ```rust,ignore
//! use rippledb::doc;
//!
//! let users = db.collection("users")?;
//! users.ensure_index(&doc! { age: 1 }, &non_unique_index())?;
//! users.ensure_index(&doc! { email: 1 }, &unique_index())?;
//! let teens = users.find(&doc! { age: { "$gt": 12, "$lt": 20 } })?;
//! ```
//!
//! The query planner asks every index for its [IndexCoverage] of a query
//! and scans the candidates of the best one.

mod descriptor;
mod index_kind;
mod key_bounds;
mod keyed_index;
mod options;
mod primary_index;

pub use descriptor::*;
pub use index_kind::*;
pub use key_bounds::*;
pub use keyed_index::*;
pub use options::*;
pub use primary_index::*;
