pub mod cloud;
pub mod config;
pub mod error;
pub mod query;
pub mod types;

pub use cloud::PointCloud;
pub use config::ExtractionConfig;
pub use error::{ExtractError, Result};
pub use query::{
    ExtractionSink, NodeCache, NullCache, RequestId, RequestState, RequestStats, StepOutcome,
};
pub use types::{
    AttributeData, BoundingBox, BoundingSphere, Node, NodeEncoding, NodeId, Octree,
    OrientedVolume, PointBatch, ScalarType,
};
