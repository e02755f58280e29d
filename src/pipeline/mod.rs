//! Raymarching Deferred Pipeline
//!
//! Composites rasterized scene geometry with signed-distance-field
//! primitives sphere-traced in compute, sharing one depth buffer so both
//! worlds occlude each other correctly.
//!
//! # Anatomy of a frame
//!
//! | Phase | Work |
//! |-------|------|
//! | Setup | allocate frame targets, clear depth and G-buffer |
//! | Opaque | rasterize opaque geometry into the G-buffer |
//! | Sphere trace | march SDF primitives, write G-buffer + shadow mask + linear depth |
//! | Depth reconcile | fold traced linear depth into the hardware depth target |
//! | Deferred | bind light arrays, resolve lighting into the pre-fog target |
//! | Fog | composite fog into the post-fog target |
//! | Sky + transparency | skybox, then forward transparent geometry |
//! | Present | camera-target depth copy, final blit, release targets |
//!
//! Cameras render strictly in the order given; each camera's frame ends
//! with exactly one submit. The phase order is fixed.
//!
//! [`RaymarchPipeline`] holds no per-frame state. Everything a frame needs
//! lives in [`FrameTargets`](frame::FrameTargets) and the frozen batches,
//! so rendering the same scene twice emits the same commands.

pub mod collector;
pub mod frame;
pub mod lights;
pub mod passes;
pub mod records;

use log::{debug, info, trace};

use crate::errors::Result;
use crate::gpu::command::KernelRef;
use crate::gpu::context::{DrawSettings, RenderContext};
use crate::gpu::prop::PropId;
use crate::pipeline::frame::FrameTargets;
use crate::pipeline::lights::LightBuffer;
use crate::scene::camera::RenderCamera;
use crate::scene::registry::PrimitiveRegistry;
use crate::settings::PipelineSettings;

/// Pass tag for opaque geometry rasterized into the G-buffer.
pub const PASS_GBUFFER: &str = "GBuffer";
/// Pass tag for forward-shaded transparent geometry.
pub const PASS_FORWARD: &str = "Forward";

/// The pipeline itself. Construct once with validated settings, render any
/// number of frames.
pub struct RaymarchPipeline {
    settings: PipelineSettings,
    kernel: Option<KernelRef>,
    copy_depth: PropId,
    copy_ray_depth: PropId,
    deferred: PropId,
    fog: PropId,
    gbuffer_tag: PropId,
    forward_tag: PropId,
}

impl RaymarchPipeline {
    /// Validates `settings` and interns every name the pipeline uses, so
    /// the per-frame path never touches strings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SettingOutOfRange`] when a setting fails
    /// validation.
    ///
    /// [`PipelineError::SettingOutOfRange`]: crate::errors::PipelineError::SettingOutOfRange
    pub fn new(settings: PipelineSettings) -> Result<Self> {
        settings.validate()?;
        let kernel = settings
            .sphere_trace_program
            .as_deref()
            .map(|name| KernelRef {
                program: PropId::named(name),
                index: 0,
            });
        info!(
            "raymarch pipeline ready (sphere trace: {})",
            kernel.map_or("disabled", |k| k.program.name()),
        );
        Ok(Self {
            copy_depth: PropId::named(&settings.effects.copy_depth),
            copy_ray_depth: PropId::named(&settings.effects.copy_ray_depth),
            deferred: PropId::named(&settings.effects.deferred),
            fog: PropId::named(&settings.effects.fog),
            gbuffer_tag: PropId::named(PASS_GBUFFER),
            forward_tag: PropId::named(PASS_FORWARD),
            kernel,
            settings,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Renders every camera in order. Cameras are independent frames; a
    /// camera whose culling parameters cannot be resolved is abandoned
    /// without touching the context.
    pub fn render(
        &self,
        ctx: &mut dyn RenderContext,
        registry: &PrimitiveRegistry,
        cameras: &[RenderCamera],
    ) {
        for camera in cameras {
            self.render_camera(ctx, registry, camera);
        }
    }

    fn render_camera(
        &self,
        ctx: &mut dyn RenderContext,
        registry: &PrimitiveRegistry,
        camera: &RenderCamera,
    ) {
        let Some(culling_params) = camera.culling_params() else {
            debug!(
                "camera {}x{} has no usable culling parameters, frame abandoned",
                camera.pixel_width, camera.pixel_height
            );
            return;
        };
        trace!(
            "rendering camera {}x{}",
            camera.pixel_width, camera.pixel_height
        );

        let culling = ctx.cull(&culling_params);
        ctx.setup_camera(camera);

        let frame = FrameTargets::allocate(camera.pixel_width, camera.pixel_height);
        ctx.execute(passes::setup_targets(&frame));

        ctx.draw_renderers(&culling, &DrawSettings::opaque(self.gbuffer_tag));

        self.sphere_trace(ctx, registry, camera, &frame, &culling.visible_lights);
        // Runs whether or not the trace did, so depth state downstream is
        // the same on both paths.
        ctx.execute(passes::reconcile_depth(&frame, self.copy_ray_depth));

        ctx.execute(passes::bind_lights(&LightBuffer::pack(
            &culling.visible_lights,
        )));
        ctx.execute(passes::deferred(&frame, self.deferred));
        ctx.execute(passes::fog(
            &frame,
            self.fog,
            self.settings.fog_density,
            self.settings.fog_color_vec(),
        ));

        ctx.draw_skybox(camera);
        ctx.draw_renderers(&culling, &DrawSettings::transparent(self.forward_tag));

        ctx.execute(passes::resolve_depth(self.copy_depth));
        ctx.execute(passes::present(frame));
        ctx.submit();
    }

    fn sphere_trace(
        &self,
        ctx: &mut dyn RenderContext,
        registry: &PrimitiveRegistry,
        camera: &RenderCamera,
        frame: &FrameTargets,
        visible_lights: &[crate::scene::light::VisibleLight],
    ) {
        let Some(kernel) = self.kernel else {
            debug!("no sphere-trace program configured, SDF pass skipped");
            return;
        };
        let records = collector::ordered_records(&registry.snapshot());
        if records.is_empty() {
            debug!("no primitives registered, SDF pass skipped");
            return;
        }
        ctx.execute(passes::sphere_trace(
            frame,
            camera,
            kernel,
            &records,
            visible_lights.first(),
            self.settings.shadow_params(),
            self.settings.epsilon,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_settings() {
        let settings = PipelineSettings {
            epsilon: 0.0,
            ..PipelineSettings::default()
        };
        assert!(RaymarchPipeline::new(settings).is_err());
    }

    #[test]
    fn test_new_without_program_disables_tracing() {
        let pipeline = RaymarchPipeline::new(PipelineSettings::default()).unwrap();
        assert!(pipeline.kernel.is_none());

        let settings = PipelineSettings {
            sphere_trace_program: Some("SphereTrace".to_owned()),
            ..PipelineSettings::default()
        };
        let pipeline = RaymarchPipeline::new(settings).unwrap();
        assert_eq!(pipeline.kernel.unwrap().index, 0);
    }
}
