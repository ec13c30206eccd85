use glam::DAffine3;

use crate::types::{NodeId, Octree, OrientedVolume};

use super::intersect::volume_intersects;
use super::queue::QueueEntry;

/// Discover the queue entries to enqueue below `node`, which is already
/// known to intersect the volume.
///
/// Depth-first stack walk: every intersecting child within the depth bound
/// becomes an entry weighted by its world bounding-sphere radius. The walk
/// descends past a child (pre-collecting grandchildren) only when that child
/// sits on a hierarchy-step boundary and carries a sub-hierarchy — those
/// levels were materialized together in one chunk, so their children are
/// already addressable. Children off the boundary are expanded later, when
/// the stepper pops them in weight order.
pub fn expand(
    octree: &Octree,
    volume: &OrientedVolume,
    world_from_local: &DAffine3,
    node: NodeId,
    max_depth: u32,
) -> Vec<QueueEntry> {
    let step = octree.hierarchy_step_size();
    let mut out = Vec::new();
    let mut stack = vec![node];

    while let Some(parent) = stack.pop() {
        for child_id in octree[parent].children.iter().flatten().copied() {
            let child = &octree[child_id];
            if child.level > max_depth {
                continue;
            }
            if !volume_intersects(volume, &child.bounds, world_from_local) {
                continue;
            }
            out.push(QueueEntry {
                node: child_id,
                weight: child.bounds.world_bounding_sphere(world_from_local).radius,
            });
            if child.level < max_depth
                && child.has_children
                && step > 0
                && child.level % step == 0
            {
                stack.push(child_id);
            }
        }
    }

    out
}
