use glam::{DQuat, DVec3};

use super::bounds::BoundingBox;

/// Oriented query volume: a box with arbitrary position, rotation and
/// non-uniform scale.
///
/// The world transform is kept decomposed (translation / rotation / scale)
/// because both the admissibility test and the per-point containment test
/// work in the volume's unrotated local frame. Immutable for the duration
/// of one request's geometric tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedVolume {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl OrientedVolume {
    pub fn new(translation: DVec3, rotation: DQuat, scale: DVec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Axis-aligned volume covering `bounds` in world space.
    pub fn from_bounds(bounds: &BoundingBox) -> Self {
        Self {
            translation: bounds.center(),
            rotation: DQuat::IDENTITY,
            scale: bounds.max - bounds.min,
        }
    }

    /// Half-extents along the volume's local axes.
    pub fn half_extents(&self) -> DVec3 {
        self.scale * 0.5
    }

    /// Strict containment test for a world-space point: each local-frame
    /// axis offset must be strictly below the matching half-extent, so
    /// points exactly on a face are excluded.
    pub fn contains_world_point(&self, p: DVec3) -> bool {
        let d = self.rotation.conjugate() * (p - self.translation);
        let h = self.half_extents();
        d.x.abs() < h.x && d.y.abs() < h.y && d.z.abs() < h.z
    }
}
