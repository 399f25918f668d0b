//! Declarative partial updates.
//!
//! An update document mixes plain field writes, which deep-merge into the
//! target, with operator keys that mutate a named field:
//!
//! | operator | effect |
//! |----------|--------|
//! | `$push` | append an item, or every item of `$each` at an optional `$position` |
//! | `$pull` | remove every array element matching a query |
//! | `$pullAll` | remove every array element equal to one of a list |
//! | `$addToSet` | append unless an equal element exists |
//! | `$splicePush` | insert at the sibling `$index` |
//! | `$move` | move the first matching element to its `$index` |
//! | `$inc`, `$mul` | arithmetic on a numeric field |
//! | `$rename`, `$unset` | rename or delete a key |
//! | `$pop` | remove the last (`1`) or first (`-1`) element |
//!
//! Keys ending in `.$` are positional: they update only the array elements
//! matched by the query that selected the document.

mod interpreter;
mod operators;

pub use interpreter::*;
pub use operators::*;
