//! Primitive Descriptor Collector
//!
//! Turns a registry snapshot into the ordered primitive buffer the kernel
//! consumes. Ordering is the whole contract here:
//!
//! 1. Stable sort by operation compositing order, so equal operations keep
//!    registration order.
//! 2. Each top-level primitive is emitted with its child count, immediately
//!    followed by its direct primitive-bearing children.
//!
//! Primitives under bare scene nodes (or whose parent disappeared) are
//! silently omitted, as are children of children: one hierarchy level
//! reaches the GPU.

use crate::pipeline::records::PrimitiveRecord;
use crate::scene::registry::PrimitiveSnapshot;

/// Builds the ordered record buffer from a snapshot.
///
/// An empty snapshot yields an empty buffer, which callers treat as "skip
/// the sphere-trace pass", not as an error.
#[must_use]
pub fn ordered_records(snapshots: &[PrimitiveSnapshot]) -> Vec<PrimitiveRecord> {
    let mut order: Vec<usize> = (0..snapshots.len()).collect();
    order.sort_by_key(|&index| snapshots[index].operation.compositing_order());

    let mut records = Vec::with_capacity(snapshots.len());
    for &index in &order {
        let snapshot = &snapshots[index];
        if !snapshot.top_level {
            continue;
        }
        records.push(PrimitiveRecord::pack(
            snapshot,
            snapshot.children.len() as i32,
        ));
        for &child in &snapshot.children {
            records.push(PrimitiveRecord::pack(&snapshots[child], 0));
        }
    }
    records
}
