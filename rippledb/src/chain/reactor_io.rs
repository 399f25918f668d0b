use crate::chain::{link, unlink, Chain, ChainNode, ChainPacket};
use crate::common::new_object_id;
use crate::errors::RippleResult;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// Inspects a packet on its way through a [ReactorIo]. Returning `None`
/// swallows the packet, returning a packet forwards it downstream.
pub type ReactorProcess = Arc<dyn Fn(&ChainPacket) -> RippleResult<Option<ChainPacket>> + Send + Sync>;

/// An adapter node placed between two nodes of the propagation graph.
///
/// The reactor links itself downstream of `upstream` and upstream of
/// `downstream`; every packet the upstream sends passes through the
/// process function first. Dropping the reactor, or calling
/// [ReactorIo::drop], severs both edges.
///
/// ```rust
/// use rippledb::chain::{ChainPacket, ReactorIo};
/// use rippledb::collection::Collection;
/// use rippledb::doc;
///
/// let source = Collection::new("source");
/// let inserts_only = Collection::new("inserts_only");
/// let _reactor = ReactorIo::new(&source.as_node(), &inserts_only.as_node(), |packet| {
///     Ok(matches!(packet, ChainPacket::Insert { .. }).then(|| packet.clone()))
/// })
/// .unwrap();
///
/// source.insert_one(doc! { _id: "1" }).unwrap();
/// source.remove_by_id("1").unwrap();
/// assert_eq!(inserts_only.len(), 1);
/// ```
pub struct ReactorIo {
    inner: Arc<ReactorInner>,
}

struct ReactorInner {
    node_id: String,
    chain: Chain,
    process: ReactorProcess,
    upstream: Weak<dyn ChainNode>,
    downstream: Weak<dyn ChainNode>,
}

impl ReactorIo {
    pub fn new<F>(upstream: &Arc<dyn ChainNode>, downstream: &Arc<dyn ChainNode>, process: F) -> RippleResult<Self>
    where
        F: Fn(&ChainPacket) -> RippleResult<Option<ChainPacket>> + Send + Sync + 'static,
    {
        let node_id = new_object_id();
        let inner = Arc::new(ReactorInner {
            chain: Chain::new(&node_id),
            node_id,
            process: Arc::new(process),
            upstream: Arc::downgrade(upstream),
            downstream: Arc::downgrade(downstream),
        });

        let node: Arc<dyn ChainNode> = inner.clone();
        link(upstream, &node)?;
        if let Err(e) = link(&node, downstream) {
            unlink(upstream.as_ref(), node.as_ref());
            return Err(e);
        }

        log::debug!(
            "Reactor {} connects {} to {}",
            inner.node_id,
            upstream.node_name(),
            downstream.node_name()
        );
        Ok(ReactorIo { inner })
    }

    pub fn node_id(&self) -> String {
        self.inner.node_id.clone()
    }

    pub fn as_node(&self) -> Arc<dyn ChainNode> {
        self.inner.clone()
    }

    /// Severs the edges to both ends. Packets sent afterwards no longer
    /// reach the downstream node through this reactor.
    pub fn drop(&self) {
        self.inner.sever();
    }
}

impl ReactorInner {
    fn sever(&self) {
        if let Some(upstream) = self.upstream.upgrade() {
            unlink(upstream.as_ref(), self);
        }
        if let Some(downstream) = self.downstream.upgrade() {
            unlink(self, downstream.as_ref());
        }
    }
}

impl ChainNode for ReactorInner {
    fn node_id(&self) -> String {
        self.node_id.clone()
    }

    fn node_name(&self) -> String {
        format!("reactor-{}", self.node_id)
    }

    fn chain(&self) -> &Chain {
        &self.chain
    }

    fn chain_receive(&self, sender: &str, packet: &ChainPacket) -> RippleResult<()> {
        match (self.process)(packet)? {
            Some(packet) => self.chain.send(&packet),
            None => {
                log::trace!("Reactor {} swallowed {} from {}", self.node_id, packet, sender);
                Ok(())
            }
        }
    }
}

impl Drop for ReactorIo {
    fn drop(&mut self) {
        self.inner.sever();
    }
}

impl Debug for ReactorIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorIo").field("node_id", &self.inner.node_id).finish()
    }
}
