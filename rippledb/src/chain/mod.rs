//! The propagation graph.
//!
//! Every successful mutation of a [Collection](crate::collection::Collection)
//! is sent as a [ChainPacket] to the nodes linked downstream of it. Nodes
//! react in their own way: a [View] re-filters and re-sorts, a
//! [CollectionGroup] folds the change into its aggregate and a [ReactorIo]
//! hands the packet to a user function. Delivery is synchronous and depth
//! first, and a packet never re-enters a node that is still delivering it.

mod collection_group;
mod node;
mod packet;
mod reactor_io;
mod view;

pub use collection_group::*;
pub use node::*;
pub use packet::*;
pub use reactor_io::*;
pub use view::*;
