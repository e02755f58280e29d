//! Host Render Context
//!
//! [`RenderContext`] is the seam between the pipeline and whatever engine
//! executes it. The pipeline drives the context through a narrow surface:
//! cull, bind camera state, execute frozen command batches, draw scene
//! geometry and the skybox, submit. Everything the pipeline knows about the
//! outside world flows through this trait, which is also what makes whole
//! frames recordable and replayable in tests.

use crate::gpu::command::CommandBuffer;
use crate::gpu::prop::PropId;
use crate::scene::camera::{CullingParams, RenderCamera};
use crate::scene::light::VisibleLight;

/// What the host found visible for a camera.
///
/// Lights arrive in GPU-provided visibility order; the pipeline applies no
/// priority policy of its own beyond truncation at the light cap.
#[derive(Debug, Clone, Default)]
pub struct CullingResults {
    pub visible_lights: Vec<VisibleLight>,
}

/// Geometry ordering for a renderer draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortingCriteria {
    /// Front-to-back with state grouping; the opaque path.
    CommonOpaque,
    /// Back-to-front painter's order; the transparent path.
    CommonTransparent,
}

/// Which material queue band a renderer draw covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderQueueRange {
    Opaque,
    Transparent,
}

/// Filter and ordering for one [`RenderContext::draw_renderers`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSettings {
    /// Shader pass tag selecting which material passes may draw.
    pub pass_tag: PropId,
    pub sorting: SortingCriteria,
    pub queue: RenderQueueRange,
}

impl DrawSettings {
    /// Front-to-back opaque draw for the given pass tag.
    #[must_use]
    pub fn opaque(pass_tag: PropId) -> Self {
        Self {
            pass_tag,
            sorting: SortingCriteria::CommonOpaque,
            queue: RenderQueueRange::Opaque,
        }
    }

    /// Back-to-front transparent draw for the given pass tag.
    #[must_use]
    pub fn transparent(pass_tag: PropId) -> Self {
        Self {
            pass_tag,
            sorting: SortingCriteria::CommonTransparent,
            queue: RenderQueueRange::Transparent,
        }
    }
}

/// The host engine surface the pipeline renders through.
///
/// Contract:
/// - [`execute`](Self::execute) consumes batches in emission order; the
///   context may defer real GPU work until [`submit`](Self::submit).
/// - [`draw_renderers`](Self::draw_renderers) and
///   [`draw_skybox`](Self::draw_skybox) draw into whatever targets the most
///   recently executed `SetRenderTarget` bound.
/// - [`submit`](Self::submit) flushes the camera's frame to the GPU
///   timeline; the pipeline calls it exactly once per rendered camera.
pub trait RenderContext {
    /// Computes visibility for a camera whose culling parameters resolved.
    fn cull(&mut self, params: &CullingParams) -> CullingResults;

    /// Binds camera matrices and viewport state for subsequent draws.
    fn setup_camera(&mut self, camera: &RenderCamera);

    /// Queues a frozen command batch for execution.
    fn execute(&mut self, buffer: CommandBuffer);

    /// Draws visible scene geometry matching `settings`.
    fn draw_renderers(&mut self, culling: &CullingResults, settings: &DrawSettings);

    /// Draws the host's skybox for `camera` into the bound targets.
    fn draw_skybox(&mut self, camera: &RenderCamera);

    /// Flushes everything queued for the current camera.
    fn submit(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_settings_constructors() {
        let tag = PropId::named("GBuffer");
        let opaque = DrawSettings::opaque(tag);
        assert_eq!(opaque.sorting, SortingCriteria::CommonOpaque);
        assert_eq!(opaque.queue, RenderQueueRange::Opaque);

        let transparent = DrawSettings::transparent(PropId::named("Forward"));
        assert_eq!(transparent.sorting, SortingCriteria::CommonTransparent);
        assert_eq!(transparent.queue, RenderQueueRange::Transparent);
    }
}
