use std::collections::HashMap;

use super::attribute::AttributeData;
use super::bounds::BoundingBox;

/// A compacted batch of accepted points, possibly spanning several nodes.
///
/// Positions are 3 `f32` per point in the point cloud's local frame (the
/// same frame the source buffers use), not world space. Every other
/// attribute appears under its own name with the original per-point stride
/// preserved.
#[derive(Debug, Clone, Default)]
pub struct PointBatch {
    pub positions: Vec<f32>,
    pub attributes: HashMap<String, AttributeData>,
    pub num_points: usize,
    /// Bounds of the accepted positions; inverted while empty.
    pub bounds: BoundingBox,
}

impl PointBatch {
    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }
}
