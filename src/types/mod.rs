pub mod attribute;
pub mod batch;
pub mod bounds;
pub mod node;
pub mod volume;

pub use attribute::{AttributeData, ScalarType};
pub use batch::PointBatch;
pub use bounds::{BoundingBox, BoundingSphere};
pub use node::{Node, NodeEncoding, NodeId, Octree};
pub use volume::OrientedVolume;
