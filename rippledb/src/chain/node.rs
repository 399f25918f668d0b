use crate::chain::ChainPacket;
use crate::collection::Document;
use crate::errors::{ErrorKind, RippleError, RippleResult};
use parking_lot::RwLock;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

thread_local! {
    /// Ids of the nodes currently sending a packet on this thread.
    static DELIVERY_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// A participant of the propagation graph.
///
/// Collections, views, collection groups and reactors are nodes. A node
/// owns a [Chain] holding its edges and handles the packets its upstream
/// nodes send in [ChainNode::chain_receive].
pub trait ChainNode: Send + Sync {
    /// Identity of the node within the process.
    fn node_id(&self) -> String;

    fn node_name(&self) -> String;

    fn chain(&self) -> &Chain;

    /// Handles a packet sent by the upstream node `sender`.
    fn chain_receive(&self, sender: &str, packet: &ChainPacket) -> RippleResult<()>;

    /// The documents the node currently holds, if it holds any.
    ///
    /// Downstream nodes without a source of their own rebuild from this.
    fn chain_data(&self) -> Option<Vec<Document>> {
        None
    }
}

/// The edges of one node: strong forward edges to downstream nodes and
/// weak reverse edges to upstream nodes.
pub struct Chain {
    owner_id: String,
    downstream: RwLock<Vec<Arc<dyn ChainNode>>>,
    upstream: RwLock<Vec<Weak<dyn ChainNode>>>,
}

impl Chain {
    pub fn new(owner_id: &str) -> Self {
        Chain {
            owner_id: owner_id.to_string(),
            downstream: RwLock::new(Vec::new()),
            upstream: RwLock::new(Vec::new()),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn downstream_count(&self) -> usize {
        self.downstream.read().len()
    }

    /// Number of upstream nodes still alive.
    pub fn upstream_count(&self) -> usize {
        self.upstream.read().iter().filter(|n| n.strong_count() > 0).count()
    }

    pub fn has_downstream(&self, node_id: &str) -> bool {
        self.downstream.read().iter().any(|n| n.node_id() == node_id)
    }

    pub fn has_upstream(&self, node_id: &str) -> bool {
        self.upstream
            .read()
            .iter()
            .filter_map(|n| n.upgrade())
            .any(|n| n.node_id() == node_id)
    }

    /// Upstream nodes still alive, in link order.
    pub fn upstream_nodes(&self) -> Vec<Arc<dyn ChainNode>> {
        self.upstream.read().iter().filter_map(|n| n.upgrade()).collect()
    }

    /// Delivers `packet` to every downstream node, depth first.
    ///
    /// A node already delivering on this thread is skipped, so a packet never
    /// re-enters a node through a cycle. The first downstream error aborts
    /// the delivery and is returned.
    pub fn send(&self, packet: &ChainPacket) -> RippleResult<()> {
        let targets: Vec<Arc<dyn ChainNode>> = self.downstream.read().clone();
        if targets.is_empty() {
            return Ok(());
        }

        let _delivery = DeliveryGuard::enter(&self.owner_id);
        for node in targets {
            let node_id = node.node_id();
            if is_delivering(&node_id) {
                log::debug!("Skipping {} for {}, it is already delivering", node_id, packet);
                continue;
            }
            log::debug!("Sending {} from {} to {}", packet, self.owner_id, node.node_name());
            node.chain_receive(&self.owner_id, packet)?;
        }
        Ok(())
    }

    fn add_downstream(&self, node: Arc<dyn ChainNode>) {
        self.downstream.write().push(node);
    }

    fn remove_downstream(&self, node_id: &str) -> bool {
        let mut downstream = self.downstream.write();
        let before = downstream.len();
        downstream.retain(|n| n.node_id() != node_id);
        downstream.len() != before
    }

    fn add_upstream(&self, node: Weak<dyn ChainNode>) {
        self.upstream.write().push(node);
    }

    fn remove_upstream(&self, node_id: &str) {
        self.upstream
            .write()
            .retain(|n| n.upgrade().is_some_and(|n| n.node_id() != node_id));
    }

    /// Severs every edge of the owner, in both directions.
    pub fn unlink_all(&self) {
        let downstream: Vec<Arc<dyn ChainNode>> = std::mem::take(&mut *self.downstream.write());
        for node in downstream {
            node.chain().remove_upstream(&self.owner_id);
        }

        let upstream: Vec<Weak<dyn ChainNode>> = std::mem::take(&mut *self.upstream.write());
        for node in upstream.iter().filter_map(|n| n.upgrade()) {
            node.chain().remove_downstream(&self.owner_id);
        }
    }
}

/// Registers `downstream` to receive the packets of `upstream`.
///
/// Linking an existing edge again is a no-op. Linking a node to itself is
/// rejected; longer cycles are the caller's responsibility.
pub fn link(upstream: &Arc<dyn ChainNode>, downstream: &Arc<dyn ChainNode>) -> RippleResult<()> {
    let downstream_id = downstream.node_id();
    if upstream.node_id() == downstream_id {
        log::error!("Cannot chain {} to itself", upstream.node_name());
        return Err(RippleError::new(
            &format!("Cannot chain {} to itself", upstream.node_name()),
            ErrorKind::InvalidOperation,
        ));
    }
    if upstream.chain().has_downstream(&downstream_id) {
        return Ok(());
    }

    upstream.chain().add_downstream(downstream.clone());
    downstream.chain().add_upstream(Arc::downgrade(upstream));
    log::debug!("Chained {} to {}", downstream.node_name(), upstream.node_name());
    Ok(())
}

/// Removes the edge from `upstream` to `downstream`. Returns whether an
/// edge existed.
pub fn unlink(upstream: &dyn ChainNode, downstream: &dyn ChainNode) -> bool {
    let removed = upstream.chain().remove_downstream(&downstream.node_id());
    downstream.chain().remove_upstream(&upstream.node_id());
    removed
}

fn is_delivering(node_id: &str) -> bool {
    DELIVERY_STACK.with(|stack| stack.borrow().iter().any(|id| id == node_id))
}

struct DeliveryGuard;

impl DeliveryGuard {
    fn enter(node_id: &str) -> Self {
        DELIVERY_STACK.with(|stack| stack.borrow_mut().push(node_id.to_string()));
        DeliveryGuard
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
