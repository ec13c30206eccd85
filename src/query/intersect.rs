use glam::DAffine3;

use crate::types::{BoundingBox, OrientedVolume};

/// Conservative admissibility test: does the oriented volume possibly
/// intersect a node's bounds?
///
/// The node box is reduced to its world bounding sphere, the volume to a
/// capsule around its local X axis: the closest point on that segment to the
/// sphere center is found, and the remaining offset is examined in the
/// volume's unrotated frame against `radius + half_extent` slabs on Y and Z
/// (the segment already spans the X half-extent, so X compares against the
/// radius alone). May report true for near-misses; never false for a true
/// intersection, so an exact per-point pass can rely on it as a filter.
pub fn volume_intersects(
    volume: &OrientedVolume,
    bounds: &BoundingBox,
    world_from_local: &DAffine3,
) -> bool {
    let sphere = bounds.world_bounding_sphere(world_from_local);
    let half = volume.half_extents();

    // Segment spanning the volume's X extent in world space.
    let axis = volume.rotation * glam::DVec3::X;
    let a = volume.translation - axis * half.x;
    let b = volume.translation + axis * half.x;

    let ab = b - a;
    let len_sq = ab.length_squared();
    let t = if len_sq > 0.0 {
        ((sphere.center - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = a + ab * t;

    let d = volume.rotation.conjugate() * (sphere.center - closest);
    d.x.abs() < sphere.radius
        && d.y.abs() < sphere.radius + half.y
        && d.z.abs() < sphere.radius + half.z
}
