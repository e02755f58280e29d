//! Ordered primitive buffer tests
//!
//! Tests for:
//! - Registry-to-record flow across a mixed scene
//! - Buffer updates after scene mutation
//! - Hierarchy resolution end to end
//! - The byte-level kernel contract

use glam::Vec3;
use selenite::pipeline::collector::ordered_records;
use selenite::pipeline::records::{
    BLEND_STRENGTH_SCALE, PRIMITIVE_RECORD_SIZE, PRIMITIVE_SCHEMA_VERSION, PrimitiveRecord,
    offsets,
};
use selenite::scene::{Operation, PrimitiveDesc, PrimitiveKind, PrimitiveRegistry};

// ============================================================================
// Helpers
// ============================================================================

fn prim(kind: PrimitiveKind, operation: Operation) -> PrimitiveDesc {
    PrimitiveDesc {
        kind,
        operation,
        ..PrimitiveDesc::default()
    }
}

fn tagged(operation: Operation, tag: f32) -> PrimitiveDesc {
    let mut desc = prim(PrimitiveKind::Sphere, operation);
    desc.color = Vec3::new(tag, 0.0, 0.0);
    desc
}

fn records_of(registry: &PrimitiveRegistry) -> Vec<PrimitiveRecord> {
    ordered_records(&registry.snapshot())
}

fn tags_of(records: &[PrimitiveRecord]) -> Vec<f32> {
    records.iter().map(|record| record.color[0]).collect()
}

// ============================================================================
// Mixed Scenes
// ============================================================================

#[test]
fn mixed_scene_orders_groups_by_operation() {
    let mut registry = PrimitiveRegistry::new();
    // Two parent groups in different operations plus loose primitives,
    // registered in an order that exercises the stable sort.
    let cutter = registry.register(tagged(Operation::Cut, 10.0));
    registry
        .register_child(cutter, tagged(Operation::None, 11.0))
        .unwrap();
    registry.register(tagged(Operation::Blend, 20.0));
    let base = registry.register(tagged(Operation::None, 30.0));
    registry
        .register_child(base, tagged(Operation::Mask, 31.0))
        .unwrap();
    registry
        .register_child(base, tagged(Operation::Blend, 32.0))
        .unwrap();
    registry.register(tagged(Operation::Blend, 40.0));

    let records = records_of(&registry);
    // Groups travel whole: each parent drags its children along, and the
    // group takes the slot the parent's own operation sorts to.
    assert_eq!(
        tags_of(&records),
        vec![30.0, 31.0, 32.0, 20.0, 40.0, 10.0, 11.0]
    );
    assert_eq!(records[0].child_count, 2);
    assert_eq!(records[5].child_count, 1);
}

#[test]
fn loose_primitives_keep_registration_order_within_operation() {
    let mut registry = PrimitiveRegistry::new();
    registry.register(tagged(Operation::Blend, 1.0));
    registry.register(tagged(Operation::None, 9.0));
    registry.register(tagged(Operation::Blend, 2.0));
    registry.register(tagged(Operation::Blend, 3.0));

    assert_eq!(tags_of(&records_of(&registry)), vec![9.0, 1.0, 2.0, 3.0]);
}

// ============================================================================
// Scene Mutation
// ============================================================================

#[test]
fn removing_a_parent_drops_its_whole_group() {
    let mut registry = PrimitiveRegistry::new();
    let parent = registry.register(prim(PrimitiveKind::Sphere, Operation::None));
    registry
        .register_child(parent, prim(PrimitiveKind::Cube, Operation::Blend))
        .unwrap();
    registry.register(prim(PrimitiveKind::Torus, Operation::None));

    assert_eq!(records_of(&registry).len(), 3);
    registry.remove(parent).unwrap();

    let records = records_of(&registry);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, PrimitiveKind::Torus.code());
}

#[test]
fn removing_a_child_shrinks_the_parent_count() {
    let mut registry = PrimitiveRegistry::new();
    let parent = registry.register(prim(PrimitiveKind::Sphere, Operation::None));
    let first = registry
        .register_child(parent, prim(PrimitiveKind::Cube, Operation::Blend))
        .unwrap();
    registry
        .register_child(parent, prim(PrimitiveKind::Torus, Operation::Cut))
        .unwrap();

    registry.remove(first).unwrap();

    let records = records_of(&registry);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].child_count, 1);
    assert_eq!(records[1].kind, PrimitiveKind::Torus.code());
}

#[test]
fn operation_edits_resort_the_next_collection() {
    let mut registry = PrimitiveRegistry::new();
    let sphere = registry.register(tagged(Operation::Mask, 1.0));
    registry.register(tagged(Operation::Blend, 2.0));

    assert_eq!(tags_of(&records_of(&registry)), vec![2.0, 1.0]);

    registry.get_mut(sphere).unwrap().operation = Operation::None;
    assert_eq!(tags_of(&records_of(&registry)), vec![1.0, 2.0]);
}

// ============================================================================
// Hierarchy Resolution
// ============================================================================

#[test]
fn child_scale_compounds_with_parent_scale() {
    let mut registry = PrimitiveRegistry::new();
    let mut parent_desc = prim(PrimitiveKind::Sphere, Operation::None);
    parent_desc.transform.scale = Vec3::new(2.0, 2.0, 2.0);
    let parent = registry.register(parent_desc);

    let mut child_desc = prim(PrimitiveKind::Cube, Operation::Blend);
    child_desc.transform.scale = Vec3::new(3.0, 1.0, 0.5);
    registry.register_child(parent, child_desc).unwrap();

    let records = records_of(&registry);
    assert_eq!(records[0].scale, [2.0, 2.0, 2.0]);
    assert_eq!(records[1].scale, [6.0, 2.0, 1.0]);
}

#[test]
fn blend_strength_reaches_the_kernel_scaled_and_clamped() {
    let mut registry = PrimitiveRegistry::new();
    let mut soft = prim(PrimitiveKind::Sphere, Operation::Blend);
    soft.blend_strength = 0.5;
    registry.register(soft);
    let mut over = prim(PrimitiveKind::Sphere, Operation::Blend);
    over.blend_strength = 2.0;
    registry.register(over);

    let records = records_of(&registry);
    assert!((records[0].blend_strength - 0.5 * BLEND_STRENGTH_SCALE).abs() < 1e-6);
    assert!((records[1].blend_strength - BLEND_STRENGTH_SCALE).abs() < 1e-6);
}

#[test]
fn rotation_matrix_rides_in_the_record() {
    let mut registry = PrimitiveRegistry::new();
    let mut desc = prim(PrimitiveKind::Cube, Operation::None);
    desc.transform.rotation = Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0);
    let key = registry.register(desc);

    let records = records_of(&registry);
    let expected = registry
        .get(key)
        .unwrap()
        .transform
        .rotation_matrix()
        .to_cols_array_2d();
    assert_eq!(records[0].rotation, expected);
}

// ============================================================================
// Kernel Byte Contract
// ============================================================================

#[test]
fn record_layout_is_versioned_and_stable() {
    assert_eq!(PRIMITIVE_SCHEMA_VERSION, 1);
    assert_eq!(PRIMITIVE_RECORD_SIZE, 116);
    assert_eq!(std::mem::size_of::<PrimitiveRecord>(), PRIMITIVE_RECORD_SIZE);
}

#[test]
fn raw_bytes_match_field_offsets() {
    let mut registry = PrimitiveRegistry::new();
    let mut desc = prim(PrimitiveKind::Torus, Operation::Cut);
    desc.transform.position = Vec3::new(1.0, 2.0, 3.0);
    registry.register(desc);

    let records = records_of(&registry);
    let bytes: &[u8] = bytemuck::bytes_of(&records[0]);

    let position: [f32; 3] =
        bytemuck::pod_read_unaligned(&bytes[offsets::POSITION..offsets::POSITION + 12]);
    assert_eq!(position, [1.0, 2.0, 3.0]);

    let kind: i32 = bytemuck::pod_read_unaligned(&bytes[offsets::KIND..offsets::KIND + 4]);
    assert_eq!(kind, PrimitiveKind::Torus.code());

    let operation: i32 =
        bytemuck::pod_read_unaligned(&bytes[offsets::OPERATION..offsets::OPERATION + 4]);
    assert_eq!(operation, Operation::Cut.code());
}
