//! Headless raymarched-scene demo.
//!
//! Builds a small SDF scene, registers the sphere-trace kernel and the four
//! screen effects, then renders a few frames through [`WgpuExecutor`]. Run
//! with `RUST_LOG=selenite=debug` to watch the batch stream.

use glam::Vec3;
use log::info;
use selenite::exec::{EffectDesc, KernelDesc, RasterBackend, RasterTargets};
use selenite::gpu::{CullingResults, DrawSettings};
use selenite::scene::CullingParams;
use selenite::{
    Operation, PipelineSettings, PrimitiveDesc, PrimitiveKind, PrimitiveRegistry,
    PrimitiveTransform, RaymarchPipeline, RenderCamera, VisibleLight, WgpuExecutor,
};

// The depth shaders bake the same planes; keep them in sync.
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 100.0;

/// Raster backend with no geometry, just a sun for the SDF side.
struct SunOnly {
    sun: VisibleLight,
}

impl RasterBackend for SunOnly {
    fn cull(&mut self, _params: &CullingParams) -> CullingResults {
        CullingResults {
            visible_lights: vec![self.sun],
        }
    }

    fn draw_renderers(
        &mut self,
        _targets: &mut RasterTargets<'_>,
        _culling: &CullingResults,
        _settings: &DrawSettings,
    ) {
    }

    fn draw_skybox(&mut self, _targets: &mut RasterTargets<'_>, _camera: &RenderCamera) {}
}

fn build_scene(registry: &mut PrimitiveRegistry) -> selenite::Result<()> {
    // Ground slab.
    registry.register(PrimitiveDesc {
        kind: PrimitiveKind::Cube,
        color: Vec3::new(0.42, 0.40, 0.38),
        transform: PrimitiveTransform {
            position: Vec3::new(0.0, -0.75, 0.0),
            scale: Vec3::new(20.0, 0.5, 20.0),
            ..Default::default()
        },
        ..Default::default()
    });

    // Two spheres melting into each other.
    let body = registry.register(PrimitiveDesc {
        color: Vec3::new(0.85, 0.30, 0.20),
        transform: PrimitiveTransform {
            position: Vec3::new(-1.2, 0.3, 0.0),
            scale: Vec3::splat(1.6),
            ..Default::default()
        },
        ..Default::default()
    });
    registry.register_child(
        body,
        PrimitiveDesc {
            operation: Operation::Blend,
            blend_strength: 0.35,
            color: Vec3::new(0.90, 0.55, 0.25),
            transform: PrimitiveTransform {
                position: Vec3::new(-0.5, 1.0, 0.2),
                scale: Vec3::splat(0.55),
                ..Default::default()
            },
            ..Default::default()
        },
    )?;

    // A block with a spherical bite taken out of it.
    let block = registry.register(PrimitiveDesc {
        kind: PrimitiveKind::Cube,
        color: Vec3::new(0.25, 0.45, 0.75),
        transform: PrimitiveTransform {
            position: Vec3::new(1.6, 0.2, -0.4),
            rotation: Vec3::new(0.0, 35f32.to_radians(), 0.0),
            scale: Vec3::new(1.8, 1.4, 1.8),
        },
        ..Default::default()
    });
    registry.register_child(
        block,
        PrimitiveDesc {
            operation: Operation::Cut,
            transform: PrimitiveTransform {
                position: Vec3::new(2.2, 0.9, 0.2),
                scale: Vec3::splat(0.7),
                ..Default::default()
            },
            ..Default::default()
        },
    )?;

    // A torus blended softly into the ground.
    registry.register(PrimitiveDesc {
        kind: PrimitiveKind::Torus,
        operation: Operation::Blend,
        blend_strength: 0.3,
        color: Vec3::new(0.30, 0.70, 0.40),
        transform: PrimitiveTransform {
            position: Vec3::new(0.4, -0.3, 1.8),
            scale: Vec3::new(2.2, 1.0, 2.2),
            ..Default::default()
        },
        ..Default::default()
    });
    Ok(())
}

fn main() -> selenite::Result<()> {
    env_logger::init();

    // 1. The SDF scene.
    let mut registry = PrimitiveRegistry::new();
    build_scene(&mut registry)?;

    // 2. Executor with a sun, plus the kernel and effect programs.
    let sun = VisibleLight::directional(
        Vec3::new(1.0, 0.96, 0.88),
        1.1,
        Vec3::new(-0.45, -1.0, -0.35),
    );
    let mut executor = WgpuExecutor::new(Box::new(SunOnly { sun }))?;
    executor.register_kernel(&KernelDesc {
        name: "SphereTrace".into(),
        shader: include_str!("shaders/sphere_trace.wgsl").into(),
        entry_points: vec!["cs_main".into()],
    });
    executor.register_effect(&EffectDesc {
        name: "CopyRaymarchDepth".into(),
        shader: include_str!("shaders/copy_ray_depth.wgsl").into(),
        inputs: vec![],
        writes_depth: true,
    });
    executor.register_effect(&EffectDesc {
        name: "CopyDepth".into(),
        shader: include_str!("shaders/copy_depth.wgsl").into(),
        inputs: vec![],
        writes_depth: true,
    });
    executor.register_effect(&EffectDesc {
        name: "DeferredShading".into(),
        shader: include_str!("shaders/deferred.wgsl").into(),
        inputs: vec![
            "_GBuffer0".into(),
            "_GBuffer1".into(),
            "_SdfShadowMask".into(),
        ],
        writes_depth: false,
    });
    executor.register_effect(&EffectDesc {
        name: "Fog".into(),
        shader: include_str!("shaders/fog.wgsl").into(),
        inputs: vec!["_SceneColor".into(), "_CameraDepth".into()],
        writes_depth: false,
    });

    // 3. Pipeline and camera.
    let pipeline = RaymarchPipeline::new(PipelineSettings {
        sphere_trace_program: Some("SphereTrace".into()),
        ..Default::default()
    })?;
    executor.ensure_registered(pipeline.settings())?;
    let camera = RenderCamera::new_perspective(
        Vec3::new(4.0, 2.6, 6.5),
        Vec3::new(0.3, 0.4, 0.0),
        Vec3::Y,
        55f32.to_radians(),
        CAMERA_NEAR,
        CAMERA_FAR,
        1280,
        720,
    );

    // 4. A few frames; the second onward reuses pooled targets.
    for frame in 0..3 {
        pipeline.render(&mut executor, &registry, std::slice::from_ref(&camera));
        info!("frame {frame} submitted ({} primitives)", registry.len());
    }
    Ok(())
}
