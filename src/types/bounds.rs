use glam::{DAffine3, DVec3};

/// Axis-aligned bounding box in 3-D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

/// Bounding sphere derived from a box, used for fast admissibility tests
/// and as the traversal priority weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::EMPTY
    }
}

impl BoundingBox {
    /// Inverted box that expands to fit the first point added.
    pub const EMPTY: BoundingBox = BoundingBox {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Centre point of the box.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-extents along each axis.
    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Length of the space diagonal.
    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).length()
    }

    /// Whether no point was ever added (still inverted).
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Grow to include `p`.
    pub fn expand(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Return the smallest box that contains both `self` and `other`.
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether a point lies inside (or on the boundary of) the box.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Sphere enclosing the box in its own (local) frame.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center(),
            radius: self.diagonal() * 0.5,
        }
    }

    /// Sphere enclosing the box after applying `world_from_local`.
    ///
    /// Conservative under non-uniform scale: the local radius is scaled by
    /// the largest world-axis scale factor.
    pub fn world_bounding_sphere(&self, world_from_local: &DAffine3) -> BoundingSphere {
        let m = world_from_local.matrix3;
        let max_scale = m
            .x_axis
            .length()
            .max(m.y_axis.length())
            .max(m.z_axis.length());
        BoundingSphere {
            center: world_from_local.transform_point3(self.center()),
            radius: self.diagonal() * 0.5 * max_scale,
        }
    }
}
