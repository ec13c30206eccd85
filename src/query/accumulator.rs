use crate::error::{ExtractError, Result};
use crate::types::PointBatch;

/// Collects per-node batches until the owner decides to flush.
///
/// Attribute arrays are concatenated by name; the position buffer, point
/// count and bounds grow accordingly. The accumulator itself has no
/// threshold — the stepper compares `num_points()` against its configured
/// flush limit.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    batch: PointBatch,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_points(&self) -> usize {
        self.batch.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Concatenate a per-node batch. Each attribute's element type is fixed
    /// by the first batch that carries it; a later batch disagreeing on a
    /// type is rejected whole, leaving the accumulator untouched.
    pub fn push(&mut self, other: PointBatch) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        for (name, data) in &other.attributes {
            if let Some(existing) = self.batch.attributes.get(name) {
                if existing.scalar_type() != data.scalar_type() {
                    return Err(ExtractError::AttributeTypeMismatch {
                        attribute: name.clone(),
                        expected: existing.scalar_type(),
                        found: data.scalar_type(),
                    });
                }
            }
        }
        self.batch.positions.extend_from_slice(&other.positions);
        for (name, data) in other.attributes {
            match self.batch.attributes.entry(name) {
                std::collections::hash_map::Entry::Occupied(mut e) => e.get_mut().append(data),
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(data);
                }
            }
        }
        self.batch.num_points += other.num_points;
        self.batch.bounds = self.batch.bounds.merge(&other.bounds);
        Ok(())
    }

    /// Hand out the accumulated batch and reset to empty.
    pub fn take(&mut self) -> PointBatch {
        std::mem::take(&mut self.batch)
    }
}
