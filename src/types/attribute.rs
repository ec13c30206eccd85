/// Element type of an attribute array, fixed when the node is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    U8,
    U16,
    U32,
    F32,
    F64,
}

/// A typed per-point attribute array.
///
/// The length is always `num_points * elements_per_point` for the owning
/// node; the element type is carried explicitly instead of being inferred
/// from the buffer at use sites.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl AttributeData {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            AttributeData::U8(_) => ScalarType::U8,
            AttributeData::U16(_) => ScalarType::U16,
            AttributeData::U32(_) => ScalarType::U32,
            AttributeData::F32(_) => ScalarType::F32,
            AttributeData::F64(_) => ScalarType::F64,
        }
    }

    /// Total element count (not point count).
    pub fn len(&self) -> usize {
        match self {
            AttributeData::U8(v) => v.len(),
            AttributeData::U16(v) => v.len(),
            AttributeData::U32(v) => v.len(),
            AttributeData::F32(v) => v.len(),
            AttributeData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dense compaction: keep only the elements belonging to the points in
    /// `accepted`, preserving per-point element order and stride.
    pub fn gather(&self, accepted: &[u32], stride: usize) -> AttributeData {
        match self {
            AttributeData::U8(v) => AttributeData::U8(gather_vec(v, accepted, stride)),
            AttributeData::U16(v) => AttributeData::U16(gather_vec(v, accepted, stride)),
            AttributeData::U32(v) => AttributeData::U32(gather_vec(v, accepted, stride)),
            AttributeData::F32(v) => AttributeData::F32(gather_vec(v, accepted, stride)),
            AttributeData::F64(v) => AttributeData::F64(gather_vec(v, accepted, stride)),
        }
    }

    /// Concatenate `other` onto `self`. Callers compare `scalar_type` first
    /// and reject mismatched batches, so both sides carry the same element
    /// type here; a mismatch is an internal bug and panics.
    pub(crate) fn append(&mut self, other: AttributeData) {
        match (self, other) {
            (AttributeData::U8(a), AttributeData::U8(b)) => a.extend_from_slice(&b),
            (AttributeData::U16(a), AttributeData::U16(b)) => a.extend_from_slice(&b),
            (AttributeData::U32(a), AttributeData::U32(b)) => a.extend_from_slice(&b),
            (AttributeData::F32(a), AttributeData::F32(b)) => a.extend_from_slice(&b),
            (AttributeData::F64(a), AttributeData::F64(b)) => a.extend_from_slice(&b),
            (a, b) => panic!(
                "attribute element type changed between nodes: {:?} vs {:?}",
                a.scalar_type(),
                b.scalar_type()
            ),
        }
    }
}

fn gather_vec<T: Copy>(src: &[T], accepted: &[u32], stride: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(accepted.len() * stride);
    for &i in accepted {
        let base = i as usize * stride;
        out.extend_from_slice(&src[base..base + stride]);
    }
    out
}
