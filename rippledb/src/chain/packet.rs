use crate::collection::{Document, UpdateOptions};
use std::fmt::{Display, Formatter};

/// A mutation delta forwarded from a node to its downstream nodes.
///
/// Packets are only sent for mutations that changed something.
#[derive(Debug, Clone)]
pub enum ChainPacket {
    /// The whole data set was replaced.
    SetData {
        data: Vec<Document>,
        old_data: Vec<Document>,
    },
    /// Documents were added, appended or starting at `index`.
    Insert {
        data: Vec<Document>,
        index: Option<usize>,
    },
    /// `update` was applied to the documents matching `query`. `old_data`
    /// and `data` hold the changed documents before and after, pairwise.
    Update {
        query: Document,
        update: Document,
        options: UpdateOptions,
        data: Vec<Document>,
        old_data: Vec<Document>,
    },
    /// The documents matching `query` were removed.
    Remove {
        query: Document,
        data: Vec<Document>,
    },
}

impl ChainPacket {
    pub fn packet_type(&self) -> &'static str {
        match self {
            ChainPacket::SetData { .. } => "setData",
            ChainPacket::Insert { .. } => "insert",
            ChainPacket::Update { .. } => "update",
            ChainPacket::Remove { .. } => "remove",
        }
    }

    /// The documents the packet carries.
    pub fn data(&self) -> &[Document] {
        match self {
            ChainPacket::SetData { data, .. }
            | ChainPacket::Insert { data, .. }
            | ChainPacket::Update { data, .. }
            | ChainPacket::Remove { data, .. } => data,
        }
    }
}

impl Display for ChainPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({} documents)", self.packet_type(), self.data().len())
    }
}
