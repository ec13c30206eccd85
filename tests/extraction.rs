//! End-to-end extraction scenarios against synthetic octrees.
//!
//! Each test builds a small in-memory octree, drives a request the way a
//! host render loop would (one `step()` per frame), and checks the streamed
//! batches and lifecycle callbacks.

use std::collections::HashMap;
use std::time::Duration;

use glam::{DAffine3, DQuat, DVec3};

use cloud_extract::{
    AttributeData, BoundingBox, ExtractError, ExtractionConfig, ExtractionSink, Node, NodeCache,
    NodeId, Octree, OrientedVolume, PointBatch, PointCloud, RequestId, StepOutcome,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Recorder {
    batches: Vec<PointBatch>,
    finishes: usize,
    cancels: usize,
    node_errors: Vec<(NodeId, String)>,
}

impl Recorder {
    fn total_points(&self) -> usize {
        self.batches.iter().map(|b| b.num_points).sum()
    }
}

impl ExtractionSink for Recorder {
    fn on_progress(&mut self, _request: RequestId, batch: PointBatch) {
        self.batches.push(batch);
    }
    fn on_finish(&mut self, _request: RequestId) {
        self.finishes += 1;
    }
    fn on_cancel(&mut self, _request: RequestId) {
        self.cancels += 1;
    }
    fn on_node_error(&mut self, _request: RequestId, node: NodeId, error: &ExtractError) {
        self.node_errors.push((node, error.to_string()));
    }
}

#[derive(Default)]
struct Touches(Vec<NodeId>);

impl NodeCache for Touches {
    fn touch(&mut self, node: NodeId) {
        self.0.push(node);
    }
}

fn octant_bounds(parent: &BoundingBox, octant: usize) -> BoundingBox {
    let c = parent.center();
    let pick = |bit: bool, lo: f64, mid: f64, hi: f64| if bit { (mid, hi) } else { (lo, mid) };
    let (x0, x1) = pick(octant & 1 != 0, parent.min.x, c.x, parent.max.x);
    let (y0, y1) = pick(octant & 2 != 0, parent.min.y, c.y, parent.max.y);
    let (z0, z1) = pick(octant & 4 != 0, parent.min.z, c.z, parent.max.z);
    BoundingBox::new(DVec3::new(x0, y0, z0), DVec3::new(x1, y1, z1))
}

/// Store cloud-local points as node-relative f32 triplets.
fn position_attribute(bounds: &BoundingBox, points: &[DVec3]) -> HashMap<String, AttributeData> {
    let mut buf = Vec::with_capacity(points.len() * 3);
    for p in points {
        let rel = *p - bounds.min;
        buf.extend_from_slice(&[rel.x as f32, rel.y as f32, rel.z as f32]);
    }
    let mut attrs = HashMap::new();
    attrs.insert("position".to_string(), AttributeData::F32(buf));
    attrs
}

/// Sign vector pointing into an octant of a box centered at the origin.
fn octant_sign(octant: usize) -> DVec3 {
    DVec3::new(
        if octant & 1 != 0 { 1.0 } else { -1.0 },
        if octant & 2 != 0 { 1.0 } else { -1.0 },
        if octant & 4 != 0 { 1.0 } else { -1.0 },
    )
}

/// Reference scenario: root spanning [-1,1]^3 with 8 loaded children,
/// 10 uniformly spaced points each. Children 0..4 hold their points within
/// 0.2 of the origin (inside a unit box centered there); children 4..8 hold
/// theirs out near the corners.
fn scenario_tree() -> Octree {
    let root_bounds = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    let mut tree = Octree::new(Node::new(0, root_bounds, 0), 5);
    let root = tree.root();
    tree.finish_load(root, HashMap::new());

    for octant in 0..8 {
        let bounds = octant_bounds(&root_bounds, octant);
        let sign = octant_sign(octant);
        let points: Vec<DVec3> = (0..10)
            .map(|i| {
                if octant < 4 {
                    sign * (0.02 * (i + 1) as f64)
                } else {
                    sign * (0.7 + 0.02 * i as f64)
                }
            })
            .collect();
        let child = tree.insert_child(root, octant, Node::new(1, bounds, points.len()));
        tree.finish_load(child, position_attribute(&bounds, &points));
    }
    tree
}

fn unit_volume_at_origin() -> OrientedVolume {
    OrientedVolume::new(DVec3::ZERO, DQuat::IDENTITY, DVec3::splat(1.0))
}

fn run_to_completion(
    cloud: &mut PointCloud,
    id: RequestId,
    sink: &mut Recorder,
    cache: &mut Touches,
) -> usize {
    let mut steps = 0;
    loop {
        steps += 1;
        assert!(steps < 10_000, "request must terminate");
        match cloud.step(id, sink, cache) {
            StepOutcome::Finished => return steps,
            StepOutcome::InProgress | StepOutcome::Suspended => continue,
        }
    }
}

#[test]
fn two_level_scenario_yields_exactly_the_inside_points() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);

    assert_eq!(sink.finishes, 1, "on_finish fires exactly once");
    assert_eq!(sink.cancels, 0);
    assert_eq!(sink.total_points(), 40);
    for batch in &sink.batches {
        for p in batch.positions.chunks(3) {
            assert!(
                p.iter().all(|c| c.abs() < 0.5),
                "accepted point {p:?} escapes the query volume"
            );
        }
        assert!(batch.bounds.min.cmpge(DVec3::splat(-0.5)).all());
        assert!(batch.bounds.max.cmple(DVec3::splat(0.5)).all());
    }
    assert!(cloud.active_requests().is_empty(), "finished request deregistered");
}

#[test]
fn every_loaded_visit_is_touched_once() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);

    // Root plus the 8 children (all admitted: every octant touches the
    // volume), each visited and touched exactly once.
    assert_eq!(cache.0.len(), 9);
    let mut unique = cache.0.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 9, "duplicate touch for a single visit");
}

#[test]
fn pop_ceiling_bounds_touches_per_step() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let config = ExtractionConfig {
        nodes_per_step: 3,
        ..Default::default()
    };
    let id = cloud.create_request(unit_volume_at_origin(), None, config);
    let mut sink = Recorder::default();

    loop {
        let mut cache = Touches::default();
        let outcome = cloud.step(id, &mut sink, &mut cache);
        assert!(
            cache.0.len() <= 3,
            "a single step visited {} nodes, ceiling is 3",
            cache.0.len()
        );
        if outcome == StepOutcome::Finished {
            break;
        }
    }
    assert_eq!(sink.total_points(), 40);
}

#[test]
fn flush_only_above_threshold_and_resets() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let config = ExtractionConfig {
        // Children carry 10 accepted points each, so intermediate flushes
        // happen only once more than 15 points have accumulated.
        batch_points_threshold: 15,
        nodes_per_step: 2,
        ..Default::default()
    };
    let id = cloud.create_request(unit_volume_at_origin(), None, config);
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);

    assert_eq!(sink.total_points(), 40);
    let (last, intermediate) = sink.batches.split_last().unwrap();
    for batch in intermediate {
        assert!(
            batch.num_points > 15,
            "intermediate flush of {} points is below the threshold",
            batch.num_points
        );
    }
    assert!(!last.is_empty(), "final flush delivers the remainder");
}

#[test]
fn max_depth_zero_serves_no_child_points() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), Some(0), ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);

    assert_eq!(sink.finishes, 1);
    assert_eq!(sink.total_points(), 0, "level-1 nodes exceed max_depth 0");
    assert_eq!(cache.0.len(), 1, "only the root is visited");
}

#[test]
fn unloaded_children_are_deferred_until_the_host_loads_them() {
    init_tracing();
    let root_bounds = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    let mut tree = Octree::new(Node::new(0, root_bounds, 0), 5);
    let root = tree.root();
    tree.finish_load(root, HashMap::new());

    let bounds = octant_bounds(&root_bounds, 0);
    let points: Vec<DVec3> = (0..5).map(|i| octant_sign(0) * (0.02 * (i + 1) as f64)).collect();
    let child = tree.insert_child(root, 0, Node::new(1, bounds, points.len()));
    let child_attrs = position_attribute(&bounds, &points);

    let mut cloud = PointCloud::new(tree, DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    // The child is discovered but unloaded: re-enqueued, load triggered.
    let mut saw_pending = false;
    for _ in 0..3 {
        let outcome = cloud.step(id, &mut sink, &mut cache);
        assert_eq!(outcome, StepOutcome::InProgress);
        if cloud.octree_mut().drain_pending_loads() == vec![child] {
            saw_pending = true;
            break;
        }
    }
    assert!(saw_pending, "load request must surface to the host");
    assert_eq!(sink.total_points(), 0);

    cloud.octree_mut().finish_load(child, child_attrs);
    run_to_completion(&mut cloud, id, &mut sink, &mut cache);
    assert_eq!(sink.total_points(), 5);
    assert_eq!(sink.finishes, 1);
}

#[test]
fn finish_level_then_cancel_drains_served_levels_only() {
    init_tracing();
    // Root loaded with its own coarse points, children never loaded.
    let root_bounds = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    let root_points: Vec<DVec3> = (0..4).map(|i| DVec3::splat(-0.1 * (i + 1) as f64)).collect();
    let mut tree = Octree::new(Node::new(0, root_bounds, root_points.len()), 5);
    let root = tree.root();
    tree.finish_load(root, position_attribute(&root_bounds, &root_points));
    for octant in 0..8 {
        let bounds = octant_bounds(&root_bounds, octant);
        tree.insert_child(root, octant, Node::new(1, bounds, 10));
    }

    let mut cloud = PointCloud::new(tree, DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    // First step serves the root (level 0) and defers the children.
    assert_eq!(cloud.step(id, &mut sink, &mut cache), StepOutcome::InProgress);
    cloud.finish_level_then_cancel(id);
    let stats = cloud.request_stats(id).unwrap();
    assert_eq!(stats.max_depth, 0);
    assert!(stats.cancel_requested);

    // Idempotent: a second call changes nothing.
    cloud.finish_level_then_cancel(id);
    assert_eq!(cloud.request_stats(id).unwrap().max_depth, 0);

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);
    assert_eq!(sink.finishes, 1, "graceful cancel ends in a natural finish");
    assert_eq!(sink.cancels, 0);
    assert_eq!(sink.total_points(), 4, "only the already-served level is delivered");
}

#[test]
fn immediate_cancel_discards_everything() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let config = ExtractionConfig {
        // Small pop ceiling so the first step cannot drain the whole tree.
        nodes_per_step: 2,
        ..Default::default()
    };
    let id = cloud.create_request(unit_volume_at_origin(), None, config);
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    // Partially run, then cancel mid-flight.
    assert_eq!(cloud.step(id, &mut sink, &mut cache), StepOutcome::InProgress);
    cloud.cancel(id, &mut sink);

    assert_eq!(sink.cancels, 1);
    assert_eq!(sink.finishes, 0);
    assert!(cloud.active_requests().is_empty());

    // Nothing more is ever delivered.
    let before = sink.total_points();
    assert_eq!(cloud.step(id, &mut sink, &mut cache), StepOutcome::Finished);
    assert_eq!(sink.total_points(), before);
    assert_eq!(sink.cancels, 1);
}

#[test]
fn malformed_node_is_reported_and_the_rest_still_extracts() {
    init_tracing();
    // Scenario tree, but inside child 0 carries a corrupt attribute: 7
    // intensity elements for its 10 points.
    let root_bounds = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    let mut tree = Octree::new(Node::new(0, root_bounds, 0), 5);
    let root = tree.root();
    tree.finish_load(root, HashMap::new());
    for octant in 0..8 {
        let bounds = octant_bounds(&root_bounds, octant);
        let sign = octant_sign(octant);
        let points: Vec<DVec3> = (0..10)
            .map(|i| {
                if octant < 4 {
                    sign * (0.02 * (i + 1) as f64)
                } else {
                    sign * (0.7 + 0.02 * i as f64)
                }
            })
            .collect();
        let child = tree.insert_child(root, octant, Node::new(1, bounds, points.len()));
        let mut attrs = position_attribute(&bounds, &points);
        if octant == 0 {
            attrs.insert("intensity".to_string(), AttributeData::U16(vec![0; 7]));
        }
        tree.finish_load(child, attrs);
    }

    let mut cloud = PointCloud::new(tree, DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);

    assert_eq!(sink.node_errors.len(), 1);
    assert!(sink.node_errors[0].1.contains("malformed attribute layout"));
    assert_eq!(sink.finishes, 1, "the controller survives the bad node");
    assert_eq!(
        sink.total_points(),
        30,
        "three good inside children still deliver their points"
    );
}

#[test]
fn zero_time_budget_suspends_but_conserves_every_point() {
    init_tracing();
    let mut cloud = PointCloud::new(scenario_tree(), DAffine3::IDENTITY);
    let config = ExtractionConfig {
        filter_time_budget: Duration::ZERO,
        filter_check_interval: 1,
        ..Default::default()
    };
    let id = cloud.create_request(unit_volume_at_origin(), None, config);
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    let mut suspensions = 0;
    let mut steps = 0;
    loop {
        steps += 1;
        assert!(steps < 10_000, "request must terminate");
        match cloud.step(id, &mut sink, &mut cache) {
            StepOutcome::Suspended => suspensions += 1,
            StepOutcome::InProgress => {}
            StepOutcome::Finished => break,
        }
    }
    assert!(suspensions > 0, "a zero budget must suspend mid-node");
    assert_eq!(sink.total_points(), 40, "no drops, no duplicates across suspensions");
    assert_eq!(sink.finishes, 1);
}

#[test]
fn sub_hierarchy_pre_expansion_never_duplicates_a_node() {
    init_tracing();
    // Hierarchy step size 1 makes every level a boundary: children flagged
    // `has_children` get their subtrees pre-enqueued during expansion AND
    // expanded again when popped. The dedup set must keep each node's
    // points from being served twice.
    let root_bounds = BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0));
    let mut tree = Octree::new(Node::new(0, root_bounds, 0), 1);
    let root = tree.root();
    tree.finish_load(root, HashMap::new());

    let child_bounds = octant_bounds(&root_bounds, 0);
    let child = tree.insert_child(root, 0, Node::new(1, child_bounds, 0));
    tree[child].has_children = true;
    tree.finish_load(child, HashMap::new());

    let gc_bounds = octant_bounds(&child_bounds, 7); // touches the origin
    let points: Vec<DVec3> = (0..6).map(|i| octant_sign(0) * (0.03 * (i + 1) as f64)).collect();
    let gc = tree.insert_child(child, 7, Node::new(2, gc_bounds, points.len()));
    tree.finish_load(gc, position_attribute(&gc_bounds, &points));

    let mut cloud = PointCloud::new(tree, DAffine3::IDENTITY);
    let id = cloud.create_request(unit_volume_at_origin(), None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);
    assert_eq!(sink.total_points(), 6, "grandchild served exactly once");
    let mut touched = cache.0.clone();
    touched.sort();
    touched.dedup();
    assert_eq!(touched.len(), cache.0.len(), "no node visited twice");
}

#[test]
fn rotated_volume_selects_points_along_its_own_axes() {
    init_tracing();
    // One loaded node with points along world X and world Y; a thin volume
    // rotated 90 degrees about Z accepts only the Y points.
    let bounds = BoundingBox::new(DVec3::splat(-2.0), DVec3::splat(2.0));
    let mut points = Vec::new();
    for i in 1..=5 {
        points.push(DVec3::new(0.3 * i as f64, 0.0, 0.0));
        points.push(DVec3::new(0.0, 0.3 * i as f64, 0.0));
    }
    let mut tree = Octree::new(Node::new(0, bounds, points.len()), 5);
    let root = tree.root();
    tree.finish_load(root, position_attribute(&bounds, &points));

    let volume = OrientedVolume::new(
        DVec3::ZERO,
        DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2),
        DVec3::new(4.0, 0.2, 0.2),
    );
    let mut cloud = PointCloud::new(tree, DAffine3::IDENTITY);
    let id = cloud.create_request(volume, None, ExtractionConfig::default());
    let mut sink = Recorder::default();
    let mut cache = Touches::default();

    run_to_completion(&mut cloud, id, &mut sink, &mut cache);
    assert_eq!(sink.total_points(), 5, "only the world-Y points lie inside");
    for batch in &sink.batches {
        for p in batch.positions.chunks(3) {
            assert!(p[0].abs() < 0.1 && p[1] > 0.0);
        }
    }
}
