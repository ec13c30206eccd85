use crate::types::{NodeEncoding, ScalarType};

/// All error types for the extraction engine.
///
/// Failures are scoped to the offending node or request; none of them aborts
/// the engine as a whole. Operations on a request that already reached a
/// terminal state are no-ops, not errors.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// An attribute array length is not evenly divisible by the node's point
    /// count. Extraction of the offending node is aborted; other nodes of the
    /// same request continue.
    #[error(
        "malformed attribute layout: '{attribute}' has {len} elements for {num_points} points"
    )]
    MalformedAttributeLayout {
        attribute: String,
        len: usize,
        num_points: usize,
    },
    /// Two nodes delivered the same attribute name with different element
    /// types, so their batches cannot be concatenated. The later node is
    /// dropped; other nodes of the same request continue.
    #[error("attribute '{attribute}' is {found:?}, earlier batches carry {expected:?}")]
    AttributeTypeMismatch {
        attribute: String,
        expected: ScalarType,
        found: ScalarType,
    },
    /// A node advertises more points than the per-node index space supports.
    #[error("node holds {num_points} points, more than the supported {max}", max = u32::MAX)]
    NodeTooLarge { num_points: usize },
    /// In-place attribute mutation was attempted on a node whose storage
    /// encoding is compressed.
    #[error("node storage encoding {encoding} does not support in-place attribute mutation")]
    UnsupportedEncoding { encoding: NodeEncoding },
    /// The named attribute does not exist on the node.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExtractError>;
