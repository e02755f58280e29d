//! Frame orchestration tests
//!
//! Tests for:
//! - Fixed batch order across a full camera frame
//! - Geometry draws and skybox interleaving with the frozen batches
//! - Compute dispatch sizing and skip conditions
//! - Light packing as seen from the emitted commands
//! - Target lifetime across the frame

use glam::{Vec3, Vec4};
use selenite::exec::{FrameEvent, RecordingContext};
use selenite::gpu::RenderQueueRange;
use selenite::pipeline::passes::{self, TILE_SIZE};
use selenite::pipeline::records::PRIMITIVE_RECORD_SIZE;
use selenite::scene::{PrimitiveDesc, PrimitiveRegistry, RenderCamera, VisibleLight};
use selenite::{GpuCommand, PipelineSettings, PropId, RaymarchPipeline};

const FRAME_LABELS: [&str; 8] = [
    "Set-up Render Targets",
    "Sphere tracing",
    "Raymarch copy Depth",
    "Set-up Light Buffer",
    "Deferred",
    "Fog",
    "Copy Depth",
    "Final Blit",
];

// ============================================================================
// Helpers
// ============================================================================

fn tracing_pipeline() -> RaymarchPipeline {
    let settings = PipelineSettings {
        sphere_trace_program: Some("SphereTrace".into()),
        ..PipelineSettings::default()
    };
    RaymarchPipeline::new(settings).unwrap()
}

fn one_sphere() -> PrimitiveRegistry {
    let mut registry = PrimitiveRegistry::new();
    registry.register(PrimitiveDesc::default());
    registry
}

fn camera(width: u32, height: u32) -> RenderCamera {
    RenderCamera::new_perspective(
        Vec3::new(0.0, 2.0, 8.0),
        Vec3::ZERO,
        Vec3::Y,
        60f32.to_radians(),
        0.1,
        100.0,
        width,
        height,
    )
}

fn batch_index(ctx: &RecordingContext, label: &str) -> usize {
    ctx.position(|event| matches!(event, FrameEvent::Batch(buffer) if buffer.label() == label))
        .unwrap_or_else(|| panic!("batch {label:?} not executed"))
}

fn compute_vector(ctx: &RecordingContext, param: &str) -> Option<Vec4> {
    let param = PropId::named(param);
    ctx.commands().find_map(|command| match command {
        GpuCommand::SetComputeVector {
            param: seen, value, ..
        } if *seen == param => Some(*value),
        _ => None,
    })
}

fn global_array(ctx: &RecordingContext, param: &str) -> Option<Vec<Vec4>> {
    let param = PropId::named(param);
    ctx.commands().find_map(|command| match command {
        GpuCommand::SetGlobalVectorArray {
            param: seen,
            values,
        } if *seen == param => Some(values.to_vec()),
        _ => None,
    })
}

// ============================================================================
// Batch Order
// ============================================================================

#[test]
fn batches_execute_in_fixed_order() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::with_lights(vec![VisibleLight::directional(
        Vec3::ONE,
        1.0,
        Vec3::NEG_Y,
    )]);
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    assert_eq!(ctx.batch_labels(), FRAME_LABELS);
}

#[test]
fn geometry_draws_bracket_the_frozen_batches() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    let opaque_at = ctx
        .position(|event| {
            matches!(
                event,
                FrameEvent::Draw {
                    queue: RenderQueueRange::Opaque,
                    ..
                }
            )
        })
        .unwrap();
    let transparent_at = ctx
        .position(|event| {
            matches!(
                event,
                FrameEvent::Draw {
                    queue: RenderQueueRange::Transparent,
                    ..
                }
            )
        })
        .unwrap();
    let skybox_at = ctx.position(|event| matches!(event, FrameEvent::Skybox)).unwrap();

    assert!(batch_index(&ctx, "Set-up Render Targets") < opaque_at);
    assert!(opaque_at < batch_index(&ctx, "Sphere tracing"));
    assert!(batch_index(&ctx, "Fog") < skybox_at);
    assert!(skybox_at < transparent_at);
    assert!(transparent_at < batch_index(&ctx, "Copy Depth"));
    assert!(matches!(ctx.events().last(), Some(FrameEvent::Submit)));
}

#[test]
fn each_camera_submits_once() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(
        &mut ctx,
        &one_sphere(),
        &[camera(640, 480), camera(320, 240)],
    );

    assert_eq!(ctx.submit_count(), 2);
    assert_eq!(ctx.cull_count(), 2);
    assert_eq!(ctx.batch_labels().len(), FRAME_LABELS.len() * 2);

    let setups: Vec<(u32, u32)> = ctx
        .events()
        .iter()
        .filter_map(|event| match event {
            FrameEvent::CameraSetup { width, height } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(setups, vec![(640, 480), (320, 240)]);
}

// ============================================================================
// Compute Pass
// ============================================================================

#[test]
fn dispatch_covers_viewport_in_tiles() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(1921, 1083)]);

    let groups = ctx
        .commands()
        .find_map(|command| match command {
            GpuCommand::DispatchCompute { groups, .. } => Some(*groups),
            _ => None,
        })
        .expect("sphere trace dispatched");
    assert_eq!(groups, [1921u32.div_ceil(TILE_SIZE), 1083u32.div_ceil(TILE_SIZE), 1]);
    assert_eq!(groups, [241, 136, 1]);
}

#[test]
fn empty_scene_skips_sphere_tracing() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &PrimitiveRegistry::new(), &[camera(640, 480)]);

    let labels = ctx.batch_labels();
    assert!(!labels.contains(&"Sphere tracing"));
    // Depth reconciliation still runs on the skip path.
    assert!(labels.contains(&"Raymarch copy Depth"));
    assert_eq!(ctx.submit_count(), 1);
}

#[test]
fn unconfigured_program_skips_sphere_tracing() {
    let pipeline = RaymarchPipeline::new(PipelineSettings::default()).unwrap();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    assert!(!ctx.batch_labels().contains(&"Sphere tracing"));
}

#[test]
fn primitive_buffer_rides_in_the_trace_batch() {
    let mut registry = PrimitiveRegistry::new();
    let parent = registry.register(PrimitiveDesc::default());
    registry
        .register_child(parent, PrimitiveDesc::default())
        .unwrap();
    registry.register(PrimitiveDesc::default());

    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &registry, &[camera(640, 480)]);

    let batch = ctx.find_batch("Sphere tracing").unwrap();
    let (len, stride) = batch
        .iter()
        .find_map(|command| match command {
            GpuCommand::SetComputeBuffer { data, stride, .. } => Some((data.len(), *stride)),
            _ => None,
        })
        .expect("primitive buffer uploaded");
    assert_eq!(stride, PRIMITIVE_RECORD_SIZE as u32);
    assert_eq!(len, 3 * PRIMITIVE_RECORD_SIZE);
}

// ============================================================================
// Degenerate Cameras
// ============================================================================

#[test]
fn degenerate_camera_abandons_the_frame() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(0, 480)]);

    assert!(ctx.events().is_empty());
    assert_eq!(ctx.cull_count(), 0);
    assert_eq!(ctx.submit_count(), 0);
}

#[test]
fn valid_cameras_render_around_a_degenerate_one() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(
        &mut ctx,
        &one_sphere(),
        &[camera(640, 480), camera(0, 0), camera(320, 240)],
    );

    assert_eq!(ctx.submit_count(), 2);
    assert_eq!(ctx.cull_count(), 2);
}

// ============================================================================
// Lights
// ============================================================================

#[test]
fn sun_direction_defaults_when_nothing_is_visible() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    let dir = compute_vector(&ctx, passes::PARAM_LIGHT_DIR).unwrap();
    assert_eq!(dir, Vec4::new(0.0, -1.0, 0.0, 0.0));
}

#[test]
fn first_light_feeds_the_shadow_ray() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::with_lights(vec![
        VisibleLight::directional(Vec3::ONE, 1.0, Vec3::X),
        VisibleLight::directional(Vec3::ONE, 1.0, Vec3::NEG_Z),
    ]);
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    // The shadow ray marches along the light's own forward; the global
    // array used by the deferred resolve stores the negated axis.
    let dir = compute_vector(&ctx, passes::PARAM_LIGHT_DIR).unwrap();
    assert!(dir.truncate().abs_diff_eq(Vec3::X, 1e-6));
    assert_eq!(dir.w, 0.0);

    let globals = global_array(&ctx, passes::GLOBAL_LIGHT_DIRECTIONS_OR_POSITIONS).unwrap();
    assert!(globals[0].truncate().abs_diff_eq(Vec3::NEG_X, 1e-6));
}

#[test]
fn light_arrays_cap_at_four() {
    let lights: Vec<VisibleLight> = (0..6)
        .map(|i| VisibleLight::point(Vec3::ONE, 1.0, Vec3::splat(i as f32)))
        .collect();
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::with_lights(lights);
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    let globals = global_array(&ctx, passes::GLOBAL_LIGHT_DIRECTIONS_OR_POSITIONS).unwrap();
    assert_eq!(globals.len(), 4);
    assert_eq!(globals[3], Vec4::new(3.0, 3.0, 3.0, 1.0));

    let colors = global_array(&ctx, passes::GLOBAL_LIGHT_COLORS).unwrap();
    assert_eq!(colors.len(), 4);
}

// ============================================================================
// Target Lifetime
// ============================================================================

#[test]
fn targets_release_exactly_once() {
    let pipeline = tracing_pipeline();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    let allocated = ctx
        .commands()
        .filter(|command| matches!(command, GpuCommand::AllocateTarget { .. }))
        .count();
    let released = ctx
        .commands()
        .filter(|command| matches!(command, GpuCommand::ReleaseTarget { .. }))
        .count();
    assert_eq!(allocated, 7);
    assert_eq!(released, 7);
    assert_eq!(ctx.live_target_count(), 0);

    let final_blit = ctx.find_batch("Final Blit").unwrap();
    let released_in_present = final_blit
        .iter()
        .filter(|command| matches!(command, GpuCommand::ReleaseTarget { .. }))
        .count();
    assert_eq!(released_in_present, 7);
}

#[test]
fn fog_settings_reach_the_fog_batch() {
    let settings = PipelineSettings {
        sphere_trace_program: Some("SphereTrace".into()),
        fog_density: 0.125,
        fog_color: [0.1, 0.2, 0.3, 1.0],
        ..PipelineSettings::default()
    };
    let pipeline = RaymarchPipeline::new(settings).unwrap();
    let mut ctx = RecordingContext::new();
    pipeline.render(&mut ctx, &one_sphere(), &[camera(640, 480)]);

    let fog = ctx.find_batch("Fog").unwrap();
    let density = fog.iter().find_map(|command| match command {
        GpuCommand::SetGlobalFloat { value, .. } => Some(*value),
        _ => None,
    });
    assert_eq!(density, Some(0.125));

    let color = fog.iter().find_map(|command| match command {
        GpuCommand::SetGlobalColor { value, .. } => Some(*value),
        _ => None,
    });
    assert_eq!(color, Some(Vec4::new(0.1, 0.2, 0.3, 1.0)));
}
