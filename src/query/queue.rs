use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::NodeId;

/// A pending traversal node and its priority weight.
///
/// The weight is the node's world bounding-sphere radius, so larger (coarser)
/// nodes are visited first; the synthetic root entry uses `f64::INFINITY`.
#[derive(Debug, Clone, Copy)]
pub struct QueueEntry {
    pub node: NodeId,
    pub weight: f64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Direct max-heap on the weight; infinities order correctly under
        // total_cmp, so the root entry needs no special casing. Ties break
        // on the node handle for deterministic pop order.
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Max-priority queue of pending octree nodes.
#[derive(Debug, Default)]
pub struct NodeQueue {
    heap: BinaryHeap<QueueEntry>,
}

impl NodeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueueEntry) {
        self.heap.push(entry);
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
