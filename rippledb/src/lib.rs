//! # RippleDB - In-Memory Document Database
//!
//! RippleDB is an in-memory document database with MongoDB-style queries and
//! updates, secondary indexes and live views that follow their source
//! collections through a propagation graph.
//!
//! ## Key Features
//!
//! - **Documents**: insertion-ordered documents with nested fields and arrays
//! - **Rich Querying**: `$gt`, `$in`, `$or`, `$regex`, nested paths and joins
//! - **Updates**: `$inc`, `$push`, `$pull`, `$addToSet`, positional `.$` updates and more
//! - **Indexing**: compound, multikey and unique indexes picked by a query planner
//! - **Deferred Writes**: large batches are queued and applied in chunks
//! - **Propagation Graph**: views, collection groups and reactors react to every mutation
//! - **Events**: debounced change notifications through collection listeners
//!
//! ## Quick Start
//!
//! ```rust
//! use rippledb::database::Database;
//! use rippledb::doc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::builder().open()?;
//! let users = db.collection("users")?;
//!
//! users.insert(vec![
//!     doc! { name: "Jim", age: 15 },
//!     doc! { name: "Bob", age: 22 },
//! ])?;
//!
//! let adults = users.find(&doc! { age: { "$gte": 18 } })?;
//! assert_eq!(adults.len(), 1);
//!
//! users.update(&doc! { name: "Jim" }, &doc! { "$inc": { age: 1 } })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Pattern
//!
//! Public handles such as [`collection::Collection`], [`chain::View`] and
//! [`database::Database`] wrap an `Arc` of their private state, so clones are
//! cheap and all clones observe the same data.
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, collections, find options and the deferred queue
//! - [`chain`] - The propagation graph: views, collection groups and reactors
//! - [`common`] - Values, paths, constants, the event bus and utilities
//! - [`config`] - Database-wide defaults
//! - [`database`] - The registry of collections, views and groups
//! - [`database_builder`] - Fluent database configuration
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Index kinds, descriptors and the keyed index
//! - [`query`] - Query parsing and matching
//! - [`update`] - Update operators

use crate::common::*;
use std::sync::LazyLock;

pub mod chain;
pub mod collection;
pub mod common;
pub mod config;
pub mod database;
pub mod database_builder;
pub mod errors;
pub mod index;
pub mod query;
pub mod update;

pub(crate) static FIELD_SEPARATOR: LazyLock<Atomic<String>> =
    LazyLock::new(|| atomic(DEFAULT_FIELD_SEPARATOR.to_string()));

pub(crate) static SCHEDULER: LazyLock<Scheduler> = LazyLock::new(Scheduler::new);
