pub mod accumulator;
pub mod expand;
pub mod filter;
pub mod intersect;
pub mod queue;
pub mod request;

pub use intersect::volume_intersects;
pub use request::{ExtractionRequest, RequestId, RequestState, RequestStats, StepOutcome};

use crate::error::ExtractError;
use crate::types::{NodeId, PointBatch};

/// Consumer of a request's streamed results.
///
/// `on_progress` delivers each flushed batch, `on_finish` fires exactly once
/// when the queue drains, `on_cancel` exactly once on immediate
/// cancellation; none of them is invoked after the request reaches a
/// terminal state. `on_node_error` reports a node whose extraction was
/// aborted (the request itself keeps running).
pub trait ExtractionSink {
    fn on_progress(&mut self, request: RequestId, batch: PointBatch);
    fn on_finish(&mut self, request: RequestId);
    fn on_cancel(&mut self, request: RequestId);
    fn on_node_error(&mut self, request: RequestId, node: NodeId, error: &ExtractError) {
        let _ = (request, node, error);
    }
}

/// External eviction mechanism. Every loaded node a step visits is reported
/// here exactly once per visit; retention policy is entirely the
/// implementor's concern.
pub trait NodeCache {
    fn touch(&mut self, node: NodeId);
}

/// Cache sink for hosts without an eviction mechanism.
pub struct NullCache;

impl NodeCache for NullCache {
    fn touch(&mut self, _node: NodeId) {}
}
