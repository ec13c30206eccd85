use std::collections::HashMap;
use std::time::Instant;

use glam::{DAffine3, DVec3};

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Result};
use crate::types::{AttributeData, BoundingBox, NodeId, Octree, OrientedVolume, PointBatch};

/// Outcome of one filter resume.
#[derive(Debug)]
pub enum FilterProgress {
    /// Time budget exhausted mid-node; call `resume` again to continue from
    /// the retained cursor.
    Suspended,
    /// Every point tested; compacted batch ready.
    Complete(PointBatch),
}

/// Resumable per-node point filter and attribute compactor.
///
/// Holds the node handle, the next point index and the partially accepted
/// index/position buffers, so a resume after suspension neither redoes work
/// nor double-counts points. Attribute compaction happens once, after the
/// last point is tested.
#[derive(Debug)]
pub struct FilterState {
    node: NodeId,
    cursor: usize,
    accepted: Vec<u32>,
    positions: Vec<f32>,
    bounds: BoundingBox,
}

impl FilterState {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            cursor: 0,
            accepted: Vec::new(),
            positions: Vec::new(),
            bounds: BoundingBox::EMPTY,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Test points from the retained cursor until done or over budget.
    ///
    /// Positions are stored node-relative; the world position is
    /// `world_from_local * (bounds.min + p)`. A point is accepted when each
    /// axis offset in the volume's local frame is strictly below the
    /// matching half-extent. Accepted positions are written back in the
    /// cloud-local frame (`bounds.min + p`).
    pub fn resume(
        &mut self,
        octree: &Octree,
        world_from_local: &DAffine3,
        volume: &OrientedVolume,
        config: &ExtractionConfig,
    ) -> Result<FilterProgress> {
        let node = &octree[self.node];
        if node.num_points == 0 {
            return Ok(FilterProgress::Complete(PointBatch::default()));
        }
        // Accepted indices are u32; refuse nodes that cannot be indexed.
        if node.num_points > u32::MAX as usize {
            return Err(ExtractError::NodeTooLarge {
                num_points: node.num_points,
            });
        }

        let positions = match node.attribute("position") {
            Some(AttributeData::F32(v)) if v.len() == node.num_points * 3 => v,
            other => {
                return Err(ExtractError::MalformedAttributeLayout {
                    attribute: "position".into(),
                    len: other.map_or(0, |a| a.len()),
                    num_points: node.num_points,
                });
            }
        };

        let offset = node.bounds.min;
        let half = volume.half_extents();
        let inv_rotation = volume.rotation.conjugate();
        let started = Instant::now();
        let mut since_check = 0usize;

        for i in self.cursor..node.num_points {
            if since_check >= config.filter_check_interval {
                since_check = 0;
                if started.elapsed() > config.filter_time_budget {
                    self.cursor = i;
                    return Ok(FilterProgress::Suspended);
                }
            }
            since_check += 1;

            let base = i * 3;
            let local = offset
                + DVec3::new(
                    positions[base] as f64,
                    positions[base + 1] as f64,
                    positions[base + 2] as f64,
                );
            let world = world_from_local.transform_point3(local);
            let d = inv_rotation * (world - volume.translation);
            if d.x.abs() < half.x && d.y.abs() < half.y && d.z.abs() < half.z {
                self.accepted.push(i as u32);
                self.positions
                    .extend_from_slice(&[local.x as f32, local.y as f32, local.z as f32]);
                self.bounds.expand(local);
            }
        }
        self.cursor = node.num_points;

        let mut attributes = HashMap::new();
        for (name, data) in node.attributes() {
            if name == "position" || name == "indices" {
                continue;
            }
            let len = data.len();
            if len % node.num_points != 0 {
                return Err(ExtractError::MalformedAttributeLayout {
                    attribute: name.clone(),
                    len,
                    num_points: node.num_points,
                });
            }
            let stride = len / node.num_points;
            attributes.insert(name.clone(), data.gather(&self.accepted, stride));
        }

        Ok(FilterProgress::Complete(PointBatch {
            positions: std::mem::take(&mut self.positions),
            attributes,
            num_points: self.accepted.len(),
            bounds: self.bounds,
        }))
    }
}
