use std::collections::{HashSet, VecDeque};

use glam::DAffine3;
use tracing::{debug, trace, warn};

use crate::config::ExtractionConfig;
use crate::types::{NodeId, Octree, OrientedVolume};

use super::accumulator::ResultAccumulator;
use super::expand::expand;
use super::filter::{FilterProgress, FilterState};
use super::intersect::volume_intersects;
use super::queue::{NodeQueue, QueueEntry};
use super::{ExtractionSink, NodeCache};

/// Handle to an active request in a point cloud's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub(crate) u64);

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Constructed, root seeded, no step executed yet.
    Pending,
    /// At least one step executed; queue non-empty or mid-flush.
    Running,
    /// Queue drained, final flush and `on_finish` delivered.
    Finished,
    /// `cancel()` discarded the queue and fired `on_cancel`.
    Cancelled,
}

/// What one `step()` call achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The cycle completed; more queue entries remain.
    InProgress,
    /// Point filtering ran over its time budget mid-node; call `step()`
    /// again to resume the same logical cycle before a new one starts.
    Suspended,
    /// Terminal: the request finished (or the handle was already stale).
    Finished,
}

/// Observable counters of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStats {
    pub state: RequestState,
    pub points_served: u64,
    pub highest_level_served: u32,
    pub max_depth: u32,
    pub cancel_requested: bool,
}

/// Candidates gathered by one pop cycle, filtered across one or more
/// `step()` calls when the point filter suspends.
#[derive(Debug)]
struct Cycle {
    candidates: VecDeque<NodeId>,
    active: Option<FilterState>,
}

/// One progressive extraction over a point cloud's octree.
///
/// Owns the priority queue, the accumulator and the resumable cycle state;
/// driven exclusively through [`crate::PointCloud`] by handle.
#[derive(Debug)]
pub struct ExtractionRequest {
    id: RequestId,
    volume: OrientedVolume,
    max_depth: u32,
    config: ExtractionConfig,
    queue: NodeQueue,
    /// Nodes ever enqueued; overlapping traversal paths and sub-hierarchy
    /// pre-expansion would otherwise enqueue the same node twice.
    seen: HashSet<NodeId>,
    accumulator: ResultAccumulator,
    cycle: Option<Cycle>,
    points_served: u64,
    highest_level_served: u32,
    cancel_requested: bool,
    state: RequestState,
}

impl ExtractionRequest {
    pub(crate) fn new(
        id: RequestId,
        root: NodeId,
        volume: OrientedVolume,
        max_depth: Option<u32>,
        config: ExtractionConfig,
    ) -> Self {
        let mut queue = NodeQueue::new();
        queue.push(QueueEntry {
            node: root,
            weight: f64::INFINITY,
        });
        let mut seen = HashSet::new();
        seen.insert(root);
        Self {
            id,
            volume,
            max_depth: max_depth.unwrap_or(u32::MAX),
            config,
            queue,
            seen,
            accumulator: ResultAccumulator::new(),
            cycle: None,
            points_served: 0,
            highest_level_served: 0,
            cancel_requested: false,
            state: RequestState::Pending,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            state: self.state,
            points_served: self.points_served,
            highest_level_served: self.highest_level_served,
            max_depth: self.max_depth,
            cancel_requested: self.cancel_requested,
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self.state, RequestState::Finished | RequestState::Cancelled)
    }

    /// One cooperative stepping cycle. See `StepOutcome` for the contract.
    pub(crate) fn step(
        &mut self,
        octree: &mut Octree,
        world_from_local: &DAffine3,
        sink: &mut dyn ExtractionSink,
        cache: &mut dyn NodeCache,
    ) -> StepOutcome {
        if self.is_terminal() {
            return StepOutcome::Finished;
        }
        self.state = RequestState::Running;

        // Finish a suspended cycle before popping anything new.
        if !self.drive_cycle(octree, world_from_local, sink) {
            return StepOutcome::Suspended;
        }

        let mut candidates = VecDeque::new();
        let mut deferred: Vec<QueueEntry> = Vec::new();
        for _ in 0..self.config.nodes_per_step {
            let Some(entry) = self.queue.pop() else { break };
            let node = &octree[entry.node];
            if node.level > self.max_depth {
                trace!(node = entry.node.index(), level = node.level, "beyond depth bound, dropped");
                continue;
            }
            if node.loaded() {
                cache.touch(entry.node);
                self.highest_level_served = self.highest_level_served.max(node.level);
                candidates.push_back(entry.node);
                for found in expand(octree, &self.volume, world_from_local, entry.node, self.max_depth)
                {
                    if self.seen.insert(found.node) {
                        self.queue.push(found);
                    }
                }
            } else {
                // Deferred, not dropped: loading is asynchronous, so the
                // entry is retried on a later cycle at the same weight.
                octree.begin_load(entry.node);
                deferred.push(entry);
            }
        }
        for entry in deferred {
            self.queue.push(entry);
        }

        if !candidates.is_empty() {
            debug!(
                request = self.id.0,
                candidates = candidates.len(),
                queued = self.queue.len(),
                "filtering cycle candidates"
            );
            self.cycle = Some(Cycle {
                candidates,
                active: None,
            });
            if !self.drive_cycle(octree, world_from_local, sink) {
                return StepOutcome::Suspended;
            }
        }

        if self.queue.is_empty() {
            if !self.accumulator.is_empty() {
                self.flush(sink);
            }
            debug!(request = self.id.0, points = self.points_served, "request finished");
            self.state = RequestState::Finished;
            sink.on_finish(self.id);
            return StepOutcome::Finished;
        }
        StepOutcome::InProgress
    }

    /// Run the pending cycle's filters to completion. Returns false when the
    /// active filter suspended and the cycle must be resumed next step.
    fn drive_cycle(
        &mut self,
        octree: &Octree,
        world_from_local: &DAffine3,
        sink: &mut dyn ExtractionSink,
    ) -> bool {
        let Some(mut cycle) = self.cycle.take() else {
            return true;
        };
        loop {
            if cycle.active.is_none() {
                let Some(node_id) = cycle.candidates.pop_front() else {
                    return true;
                };
                // Skip rule: nothing to allocate for empty nodes or nodes
                // that fail the admissibility test on re-application.
                let node = &octree[node_id];
                if node.num_points == 0
                    || !volume_intersects(&self.volume, &node.bounds, world_from_local)
                {
                    trace!(node = node_id.index(), "candidate skipped");
                    continue;
                }
                cycle.active = Some(FilterState::new(node_id));
            }

            let active = cycle.active.as_mut().unwrap();
            let node_id = active.node();
            match active.resume(octree, world_from_local, &self.volume, &self.config) {
                Ok(FilterProgress::Suspended) => {
                    self.cycle = Some(cycle);
                    return false;
                }
                Ok(FilterProgress::Complete(batch)) => {
                    cycle.active = None;
                    match self.accumulator.push(batch) {
                        Ok(()) => {
                            if self.accumulator.num_points() > self.config.batch_points_threshold {
                                self.flush(sink);
                            }
                        }
                        Err(e) => {
                            warn!(node = node_id.index(), error = %e, "node batch dropped");
                            sink.on_node_error(self.id, node_id, &e);
                        }
                    }
                }
                Err(e) => {
                    cycle.active = None;
                    warn!(node = node_id.index(), error = %e, "node extraction aborted");
                    sink.on_node_error(self.id, node_id, &e);
                }
            }
        }
    }

    fn flush(&mut self, sink: &mut dyn ExtractionSink) {
        let batch = self.accumulator.take();
        self.points_served += batch.num_points as u64;
        trace!(request = self.id.0, points = batch.num_points, "progress flush");
        sink.on_progress(self.id, batch);
    }

    /// Immediate cancellation: discard queue, partial cycle and accumulator,
    /// deliver `on_cancel` exactly once. No-op in a terminal state.
    pub(crate) fn cancel(&mut self, sink: &mut dyn ExtractionSink) {
        if self.is_terminal() {
            return;
        }
        self.queue.clear();
        self.cycle = None;
        self.accumulator.take();
        self.cancel_requested = true;
        self.state = RequestState::Cancelled;
        debug!(request = self.id.0, "request cancelled");
        sink.on_cancel(self.id);
    }

    /// Graceful cancellation: clamp the depth bound to the highest level
    /// already served and let normal stepping drain to `Finished`.
    /// Idempotent — a second call is a no-op.
    pub(crate) fn finish_level_then_cancel(&mut self) {
        if self.cancel_requested || self.is_terminal() {
            return;
        }
        self.cancel_requested = true;
        self.max_depth = self.highest_level_served;
        debug!(
            request = self.id.0,
            max_depth = self.max_depth,
            "draining current level, then finishing"
        );
    }
}
