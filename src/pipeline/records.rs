//! GPU Primitive Records
//!
//! The wire format of the ordered primitive buffer. The sphere-trace kernel
//! indexes this layout by byte offset, so the schema is versioned and every
//! offset is locked by a compile-time assertion; a mismatch is a build
//! error, never a silent misrender.
//!
//! # Schema (version 1, 116 bytes per record)
//!
//! | Field | Type | Offset |
//! |-------|------|--------|
//! | `position` | `[f32; 3]` | 0 |
//! | `scale` | `[f32; 3]` | 12 |
//! | `rotation` | `[[f32; 4]; 4]` column-major | 24 |
//! | `color` | `[f32; 3]` | 88 |
//! | `kind` | `i32` | 100 |
//! | `operation` | `i32` | 104 |
//! | `blend_strength` | `f32` | 108 |
//! | `child_count` | `i32` | 112 |

use bytemuck::{Pod, Zeroable};

use crate::scene::registry::PrimitiveSnapshot;

/// Bumped whenever the record layout changes; kernels check against it.
pub const PRIMITIVE_SCHEMA_VERSION: u32 = 1;

/// 26 floats and 3 ints.
pub const PRIMITIVE_RECORD_SIZE: usize = 4 * (26 + 3);

/// Blend strength is authored in 0..=1 and scaled up for the kernel's
/// smooth-min radius.
pub const BLEND_STRENGTH_SCALE: f32 = 3.0;

/// Byte offsets of every record field, part of the kernel contract.
pub mod offsets {
    pub const POSITION: usize = 0;
    pub const SCALE: usize = 12;
    pub const ROTATION: usize = 24;
    pub const COLOR: usize = 88;
    pub const KIND: usize = 100;
    pub const OPERATION: usize = 104;
    pub const BLEND_STRENGTH: usize = 108;
    pub const CHILD_COUNT: usize = 112;
}

/// One primitive as the kernel reads it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PrimitiveRecord {
    pub position: [f32; 3],
    /// Local scale multiplied component-wise by the parent's local scale.
    pub scale: [f32; 3],
    /// Rotation only; the kernel inverts it to march in object space.
    pub rotation: [[f32; 4]; 4],
    pub color: [f32; 3],
    pub kind: i32,
    pub operation: i32,
    /// Authored strength times [`BLEND_STRENGTH_SCALE`].
    pub blend_strength: f32,
    /// Direct primitive-bearing children following this record; 0 for
    /// children themselves.
    pub child_count: i32,
}

// Layout lock: every f32 is 4-aligned, so repr(C) packs with no padding.
const _: () = assert!(size_of::<PrimitiveRecord>() == PRIMITIVE_RECORD_SIZE);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, position) == offsets::POSITION);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, scale) == offsets::SCALE);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, rotation) == offsets::ROTATION);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, color) == offsets::COLOR);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, kind) == offsets::KIND);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, operation) == offsets::OPERATION);
const _: () =
    assert!(core::mem::offset_of!(PrimitiveRecord, blend_strength) == offsets::BLEND_STRENGTH);
const _: () = assert!(core::mem::offset_of!(PrimitiveRecord, child_count) == offsets::CHILD_COUNT);

impl PrimitiveRecord {
    /// Packs one snapshot entry.
    ///
    /// `child_count` comes from the collector: the number of records that
    /// follow this one as its direct children.
    #[must_use]
    pub fn pack(snapshot: &PrimitiveSnapshot, child_count: i32) -> Self {
        let scale = snapshot.transform.scale * snapshot.parent_scale;
        Self {
            position: snapshot.transform.position.to_array(),
            scale: scale.to_array(),
            rotation: snapshot.transform.rotation_matrix().to_cols_array_2d(),
            color: snapshot.color.to_array(),
            kind: snapshot.kind.code(),
            operation: snapshot.operation.code(),
            blend_strength: snapshot.blend_strength.clamp(0.0, 1.0) * BLEND_STRENGTH_SCALE,
            child_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::primitive::{Operation, PrimitiveKind, PrimitiveTransform};
    use glam::{Mat4, Vec3};
    use smallvec::SmallVec;

    fn snapshot() -> PrimitiveSnapshot {
        PrimitiveSnapshot {
            kind: PrimitiveKind::Torus,
            operation: Operation::Cut,
            color: Vec3::new(0.25, 0.5, 0.75),
            blend_strength: 0.4,
            transform: PrimitiveTransform {
                position: Vec3::new(1.0, 2.0, 3.0),
                rotation: Vec3::ZERO,
                scale: Vec3::new(2.0, 2.0, 2.0),
            },
            parent_scale: Vec3::new(0.5, 1.0, 2.0),
            top_level: true,
            children: SmallVec::new(),
        }
    }

    #[test]
    fn test_record_is_26_floats_3_ints() {
        assert_eq!(size_of::<PrimitiveRecord>(), 116);
        assert_eq!(offsets::CHILD_COUNT + 4, PRIMITIVE_RECORD_SIZE);
    }

    #[test]
    fn test_pack_multiplies_scales_componentwise() {
        let record = PrimitiveRecord::pack(&snapshot(), 0);
        assert_eq!(record.scale, [1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_pack_scales_blend_strength() {
        let record = PrimitiveRecord::pack(&snapshot(), 0);
        assert!((record.blend_strength - 1.2).abs() < 1e-6);

        let mut over = snapshot();
        over.blend_strength = 2.0;
        assert_eq!(
            PrimitiveRecord::pack(&over, 0).blend_strength,
            BLEND_STRENGTH_SCALE
        );
    }

    #[test]
    fn test_pack_writes_codes_and_children() {
        let record = PrimitiveRecord::pack(&snapshot(), 2);
        assert_eq!(record.kind, PrimitiveKind::Torus.code());
        assert_eq!(record.operation, Operation::Cut.code());
        assert_eq!(record.child_count, 2);
    }

    #[test]
    fn test_rotation_is_column_major_identity_for_zero_euler() {
        let record = PrimitiveRecord::pack(&snapshot(), 0);
        assert_eq!(record.rotation, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn test_records_cast_to_bytes() {
        let records = [
            PrimitiveRecord::pack(&snapshot(), 1),
            PrimitiveRecord::pack(&snapshot(), 0),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&records);
        assert_eq!(bytes.len(), 2 * PRIMITIVE_RECORD_SIZE);
    }
}
