//! Render Pass Builders
//!
//! One function per pass; each returns the frozen batch the pipeline hands
//! to the context. Builders are pure over their inputs, which keeps every
//! pass testable without a device.
//!
//! # Frame batches, in emission order
//!
//! | Label | Contents |
//! |-------|----------|
//! | `Set-up Render Targets` | target allocation + frame-start clears |
//! | `Sphere tracing` | kernel binds, uniforms, primitive upload, dispatch |
//! | `Raymarch copy Depth` | linear-depth remap into hardware depth, G-buffer rebind |
//! | `Set-up Light Buffer` | global light arrays |
//! | `Deferred` | deferred resolve into the pre-fog target |
//! | `Fog` | fog uniforms + composite into the post-fog target |
//! | `Copy Depth` | camera-target depth reconciliation |
//! | `Final Blit` | present to the camera target, release all targets |
//!
//! The opaque, skybox and transparent draws happen between batches through
//! the context itself and are sequenced by the pipeline.

use glam::Vec4;
use smallvec::smallvec;

use crate::gpu::command::{CommandBuffer, GpuCommand, KernelRef, TargetRef};
use crate::gpu::prop::PropId;
use crate::pipeline::frame::FrameTargets;
use crate::pipeline::lights::LightBuffer;
use crate::pipeline::records::{PRIMITIVE_RECORD_SIZE, PrimitiveRecord};
use crate::scene::camera::RenderCamera;
use crate::scene::light::VisibleLight;

/// Kernel thread-group edge; dispatches cover the viewport in 8×8 tiles.
pub const TILE_SIZE: u32 = 8;

// Sphere-trace kernel parameters. Texture parameters are bound under the
// target's own name.
pub const PARAM_PRIMITIVES: &str = "primitives";
pub const PARAM_PRIMITIVE_COUNT: &str = "_PrimitiveCount";
pub const PARAM_CAMERA_TO_WORLD: &str = "_CameraToWorld";
pub const PARAM_CAMERA_INVERSE_PROJECTION: &str = "_CameraInverseProjection";
pub const PARAM_WORLD_TO_CAMERA: &str = "_WorldToCamera";
pub const PARAM_CAMERA_VIEW_DIRECTION: &str = "_CameraViewDirection";
pub const PARAM_LIGHT_DIR: &str = "_LightDir";
pub const PARAM_LIGHT_POS: &str = "_LightPos";
pub const PARAM_SHADOW_PARAMS: &str = "_ShadowParams";
pub const PARAM_EPSILON: &str = "_Epsilon";

// Globals read by the deferred and fog effects.
pub const GLOBAL_LIGHT_COLORS: &str = "_VisibleLightColors";
pub const GLOBAL_LIGHT_DIRECTIONS_OR_POSITIONS: &str = "_VisibleLightDirectionsOrPositions";
pub const GLOBAL_FOG_DENSITY: &str = "_FogDensity";
pub const GLOBAL_FOG_COLOR: &str = "_FogColor";

/// Shadow rays march straight down when culling found no light at all.
const DEFAULT_LIGHT_DIR: Vec4 = Vec4::new(0.0, -1.0, 0.0, 0.0);

/// Target allocation and the frame-start clear sequence.
#[must_use]
pub fn setup_targets(frame: &FrameTargets) -> CommandBuffer {
    CommandBuffer::new("Set-up Render Targets", frame.setup_commands())
}

/// The SDF compute pass: binds the writable targets, uploads the ordered
/// primitive buffer and camera/light/shadow uniforms, then dispatches one
/// thread per pixel in [`TILE_SIZE`]² groups.
///
/// Callers skip this pass entirely when no kernel is configured or the
/// record buffer is empty; the builder assumes both are present.
#[must_use]
pub fn sphere_trace(
    frame: &FrameTargets,
    camera: &RenderCamera,
    kernel: KernelRef,
    records: &[PrimitiveRecord],
    primary_light: Option<&VisibleLight>,
    shadow_params: Vec4,
    epsilon: f32,
) -> CommandBuffer {
    let program = kernel.program;
    let (light_dir, light_pos) = primary_light.map_or(
        (DEFAULT_LIGHT_DIR, Vec4::new(0.0, 0.0, 0.0, 1.0)),
        |light| (light.forward().extend(0.0), light.position().extend(1.0)),
    );

    let bind_texture = |target: PropId| GpuCommand::SetComputeTexture {
        kernel,
        param: target,
        target,
    };

    let commands = vec![
        bind_texture(frame.gbuffer0),
        bind_texture(frame.gbuffer1),
        bind_texture(frame.shadow_mask),
        bind_texture(frame.linear_depth),
        GpuCommand::SetComputeMatrix {
            program,
            param: PropId::named(PARAM_CAMERA_TO_WORLD),
            value: camera.camera_to_world,
        },
        GpuCommand::SetComputeMatrix {
            program,
            param: PropId::named(PARAM_CAMERA_INVERSE_PROJECTION),
            value: camera.inverse_projection(),
        },
        GpuCommand::SetComputeMatrix {
            program,
            param: PropId::named(PARAM_WORLD_TO_CAMERA),
            value: camera.world_to_camera(),
        },
        GpuCommand::SetComputeVector {
            program,
            param: PropId::named(PARAM_CAMERA_VIEW_DIRECTION),
            value: camera.view_direction().extend(0.0),
        },
        GpuCommand::SetComputeVector {
            program,
            param: PropId::named(PARAM_LIGHT_DIR),
            value: light_dir,
        },
        GpuCommand::SetComputeVector {
            program,
            param: PropId::named(PARAM_LIGHT_POS),
            value: light_pos,
        },
        GpuCommand::SetComputeVector {
            program,
            param: PropId::named(PARAM_SHADOW_PARAMS),
            value: shadow_params,
        },
        GpuCommand::SetComputeFloat {
            program,
            param: PropId::named(PARAM_EPSILON),
            value: epsilon,
        },
        GpuCommand::SetComputeBuffer {
            kernel,
            param: PropId::named(PARAM_PRIMITIVES),
            data: bytemuck::cast_slice(records).into(),
            stride: PRIMITIVE_RECORD_SIZE as u32,
        },
        GpuCommand::SetComputeInt {
            program,
            param: PropId::named(PARAM_PRIMITIVE_COUNT),
            value: records.len() as i32,
        },
        GpuCommand::DispatchCompute {
            kernel,
            groups: [
                frame.width().div_ceil(TILE_SIZE),
                frame.height().div_ceil(TILE_SIZE),
                1,
            ],
        },
    ];
    CommandBuffer::new("Sphere tracing", commands)
}

/// Remaps sphere-traced linear depth into the hardware depth target, then
/// rebinds the G-buffer set. Runs every frame so the depth state after this
/// point is identical whether or not the compute pass ran.
#[must_use]
pub fn reconcile_depth(frame: &FrameTargets, copy_ray_depth: PropId) -> CommandBuffer {
    CommandBuffer::new(
        "Raymarch copy Depth",
        vec![
            GpuCommand::Blit {
                source: Some(TargetRef::Named(frame.linear_depth)),
                dest: TargetRef::Named(frame.depth),
                effect: Some(copy_ray_depth),
            },
            GpuCommand::SetRenderTarget {
                colors: smallvec![
                    TargetRef::Named(frame.gbuffer0),
                    TargetRef::Named(frame.gbuffer1),
                ],
                depth: Some(TargetRef::Named(frame.depth)),
            },
        ],
    )
}

/// Uploads the packed light arrays as globals for the deferred resolve.
#[must_use]
pub fn bind_lights(lights: &LightBuffer) -> CommandBuffer {
    CommandBuffer::new(
        "Set-up Light Buffer",
        vec![
            GpuCommand::SetGlobalVectorArray {
                param: PropId::named(GLOBAL_LIGHT_COLORS),
                values: Box::new(*lights.colors()),
            },
            GpuCommand::SetGlobalVectorArray {
                param: PropId::named(GLOBAL_LIGHT_DIRECTIONS_OR_POSITIONS),
                values: Box::new(*lights.directions_or_positions()),
            },
        ],
    )
}

/// Deferred shading resolve into the pre-fog color target, then rebinds it
/// with depth for the skybox and transparency that follow.
#[must_use]
pub fn deferred(frame: &FrameTargets, deferred_effect: PropId) -> CommandBuffer {
    CommandBuffer::new(
        "Deferred",
        vec![
            GpuCommand::Blit {
                source: None,
                dest: TargetRef::Named(frame.scene_color),
                effect: Some(deferred_effect),
            },
            GpuCommand::SetRenderTarget {
                colors: smallvec![TargetRef::Named(frame.scene_color)],
                depth: Some(TargetRef::Named(frame.depth)),
            },
        ],
    )
}

/// Fog composite from the pre-fog target into the post-fog target.
#[must_use]
pub fn fog(frame: &FrameTargets, fog_effect: PropId, density: f32, color: Vec4) -> CommandBuffer {
    CommandBuffer::new(
        "Fog",
        vec![
            GpuCommand::SetGlobalFloat {
                param: PropId::named(GLOBAL_FOG_DENSITY),
                value: density,
            },
            GpuCommand::SetGlobalColor {
                param: PropId::named(GLOBAL_FOG_COLOR),
                value: color,
            },
            GpuCommand::Blit {
                source: None,
                dest: TargetRef::Named(frame.final_color),
                effect: Some(fog_effect),
            },
            GpuCommand::SetRenderTarget {
                colors: smallvec![TargetRef::Named(frame.final_color)],
                depth: Some(TargetRef::Named(frame.depth)),
            },
        ],
    )
}

/// Reconciles camera-target depth after transparency for downstream
/// consumers.
#[must_use]
pub fn resolve_depth(copy_depth: PropId) -> CommandBuffer {
    CommandBuffer::new(
        "Copy Depth",
        vec![GpuCommand::Blit {
            source: Some(TargetRef::CameraTarget),
            dest: TargetRef::CameraTarget,
            effect: Some(copy_depth),
        }],
    )
}

/// Presents the post-fog color to the camera target and releases every
/// frame target. Consuming the frame here is what guarantees the release
/// happens exactly once per camera.
#[must_use]
pub fn present(frame: FrameTargets) -> CommandBuffer {
    let mut commands = vec![GpuCommand::Blit {
        source: Some(TargetRef::Named(frame.final_color)),
        dest: TargetRef::CameraTarget,
        effect: None,
    }];
    commands.extend(frame.release());
    CommandBuffer::new("Final Blit", commands)
}
