use std::collections::HashMap;

use glam::DAffine3;
use tracing::info;

use crate::config::ExtractionConfig;
use crate::query::request::{ExtractionRequest, RequestId, RequestStats, StepOutcome};
use crate::query::{ExtractionSink, NodeCache};
use crate::types::{Octree, OrientedVolume};

/// A point cloud: the octree data plus its world placement and the registry
/// of active extraction requests.
///
/// Requests are owned here and addressed by [`RequestId`]; a finished or
/// cancelled request deregisters itself, after which its handle is stale and
/// every operation on it is a no-op.
pub struct PointCloud {
    octree: Octree,
    world_from_local: DAffine3,
    requests: HashMap<RequestId, ExtractionRequest>,
    next_request: u64,
}

impl PointCloud {
    pub fn new(octree: Octree, world_from_local: DAffine3) -> Self {
        Self {
            octree,
            world_from_local,
            requests: HashMap::new(),
            next_request: 0,
        }
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    pub fn octree_mut(&mut self) -> &mut Octree {
        &mut self.octree
    }

    pub fn world_from_local(&self) -> DAffine3 {
        self.world_from_local
    }

    /// Start a progressive extraction of every point inside `volume`, down
    /// to `max_depth` (unbounded when `None`). The root is seeded at
    /// infinite weight; nothing runs until the host starts stepping.
    pub fn create_request(
        &mut self,
        volume: OrientedVolume,
        max_depth: Option<u32>,
        config: ExtractionConfig,
    ) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        let request = ExtractionRequest::new(id, self.octree.root(), volume, max_depth, config);
        self.requests.insert(id, request);
        info!(request = id.0, ?max_depth, "extraction request created");
        id
    }

    /// Advance one request by one cooperative cycle. Stale handles return
    /// `Finished` without side effects.
    pub fn step(
        &mut self,
        id: RequestId,
        sink: &mut dyn ExtractionSink,
        cache: &mut dyn NodeCache,
    ) -> StepOutcome {
        let Some(mut request) = self.requests.remove(&id) else {
            return StepOutcome::Finished;
        };
        let outcome = request.step(&mut self.octree, &self.world_from_local, sink, cache);
        if !request.is_terminal() {
            self.requests.insert(id, request);
        }
        outcome
    }

    /// Immediately cancel: the queue is discarded, `on_cancel` is delivered,
    /// and the handle is removed from the active set before this returns.
    pub fn cancel(&mut self, id: RequestId, sink: &mut dyn ExtractionSink) {
        if let Some(mut request) = self.requests.remove(&id) {
            request.cancel(sink);
        }
    }

    /// Gracefully cancel: clamp the request's depth bound to the highest
    /// level already served and let stepping drain it to a natural finish.
    pub fn finish_level_then_cancel(&mut self, id: RequestId) {
        if let Some(request) = self.requests.get_mut(&id) {
            request.finish_level_then_cancel();
        }
    }

    /// Counters for an active request; `None` once it deregistered.
    pub fn request_stats(&self, id: RequestId) -> Option<RequestStats> {
        self.requests.get(&id).map(|r| r.stats())
    }

    /// Handles of all active requests, in creation order.
    pub fn active_requests(&self) -> Vec<RequestId> {
        let mut ids: Vec<_> = self.requests.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }
}
