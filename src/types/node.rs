use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use tracing::debug;

use crate::error::{ExtractError, Result};

use super::attribute::AttributeData;
use super::bounds::BoundingBox;

/// Handle into the octree node arena.
///
/// Children are stored as handles rather than owning references, so the
/// hierarchy can never be mutated into a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Storage encoding of a node's attribute buffers.
///
/// The engine never decodes compressed buffers; the variant is exposed so
/// collaborators that rewrite attributes in place (e.g. classification
/// reassignment) can detect and refuse unsupported nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeEncoding {
    #[default]
    Plain,
    Compressed,
}

impl std::fmt::Display for NodeEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeEncoding::Plain => write!(f, "plain"),
            NodeEncoding::Compressed => write!(f, "compressed"),
        }
    }
}

/// One octree node.
///
/// Bounds are in the point cloud's local frame. `loaded` transitions
/// false→true exactly once, via [`Octree::finish_load`]; the children array
/// is fixed after construction of the subtree.
#[derive(Debug, Clone)]
pub struct Node {
    pub level: u32,
    pub bounds: BoundingBox,
    pub children: [Option<NodeId>; 8],
    pub num_points: usize,
    /// A further sub-hierarchy exists below this node. Only meaningful on
    /// hierarchy-step boundary levels, where child chunks materialize lazily.
    pub has_children: bool,
    encoding: NodeEncoding,
    loaded: bool,
    load_pending: bool,
    attributes: HashMap<String, AttributeData>,
}

impl Node {
    pub fn new(level: u32, bounds: BoundingBox, num_points: usize) -> Self {
        Self {
            level,
            bounds,
            children: Default::default(),
            num_points,
            has_children: false,
            encoding: NodeEncoding::Plain,
            loaded: false,
            load_pending: false,
            attributes: HashMap::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: NodeEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn encoding(&self) -> NodeEncoding {
        self.encoding
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.attributes.get(name)
    }

    /// All attribute arrays, in arbitrary order.
    pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeData)> {
        self.attributes.iter()
    }

    /// Mutable access for external in-place rewrites.
    ///
    /// Refused on compressed storage: the caller would be writing into an
    /// encoded buffer.
    pub fn attribute_values_mut(&mut self, name: &str) -> Result<&mut AttributeData> {
        if self.encoding == NodeEncoding::Compressed {
            return Err(ExtractError::UnsupportedEncoding {
                encoding: self.encoding,
            });
        }
        self.attributes
            .get_mut(name)
            .ok_or_else(|| ExtractError::UnknownAttribute(name.to_string()))
    }
}

/// Arena-backed point cloud octree.
///
/// Owns every node plus the hierarchy step size (the level granularity at
/// which sub-hierarchies are materialized) and the pending-load list the
/// external loader drains. The extraction engine only reads nodes and
/// observes the `loaded` flag.
#[derive(Debug)]
pub struct Octree {
    nodes: Vec<Node>,
    root: NodeId,
    hierarchy_step_size: u32,
    pending_loads: Vec<NodeId>,
}

impl Octree {
    pub fn new(root: Node, hierarchy_step_size: u32) -> Self {
        Self {
            nodes: vec![root],
            root: NodeId(0),
            hierarchy_step_size,
            pending_loads: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn hierarchy_step_size(&self) -> u32 {
        self.hierarchy_step_size
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert `node` into the arena and link it as `parent`'s child in the
    /// given octant slot (0..8). The slot must be empty.
    pub fn insert_child(&mut self, parent: NodeId, octant: usize, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        let slot = &mut self.nodes[parent.index()].children[octant];
        assert!(slot.is_none(), "octant {octant} of {parent:?} already occupied");
        *slot = Some(id);
        id
    }

    /// Request an asynchronous load of `id`. Idempotent: a node that is
    /// already loaded or already pending is not queued again.
    pub fn begin_load(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        if node.loaded || node.load_pending {
            return;
        }
        node.load_pending = true;
        self.pending_loads.push(id);
        debug!(node = id.index(), level = node.level, "load requested");
    }

    /// Hand the queued load requests to the external loader.
    pub fn drain_pending_loads(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending_loads)
    }

    /// Called by the external loader once a node's attribute buffers have
    /// arrived. Flips `loaded` exactly once; repeated calls are ignored.
    pub fn finish_load(&mut self, id: NodeId, attributes: HashMap<String, AttributeData>) {
        let node = &mut self.nodes[id.index()];
        if node.loaded {
            return;
        }
        node.attributes = attributes;
        node.load_pending = false;
        node.loaded = true;
        debug!(node = id.index(), level = node.level, points = node.num_points, "node loaded");
    }
}

impl Index<NodeId> for Octree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for Octree {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}
