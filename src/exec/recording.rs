//! Recording Execution Context
//!
//! A [`RenderContext`] that executes nothing. Every call is appended to an
//! event stream, so a test can render a frame and then assert on exactly
//! what the pipeline asked for and in what order. Target lifetime is
//! tracked across batches, which makes leak checks one assertion.

use rustc_hash::FxHashSet;

use crate::gpu::command::{CommandBuffer, GpuCommand};
use crate::gpu::context::{
    CullingResults, DrawSettings, RenderContext, RenderQueueRange, SortingCriteria,
};
use crate::gpu::prop::PropId;
use crate::scene::camera::{CullingParams, RenderCamera};
use crate::scene::light::VisibleLight;

/// One observed call on the context, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// `setup_camera` with the camera's pixel size.
    CameraSetup { width: u32, height: u32 },
    /// `execute` with the full frozen batch.
    Batch(CommandBuffer),
    /// `draw_renderers` with the settings it was given.
    Draw {
        pass_tag: PropId,
        sorting: SortingCriteria,
        queue: RenderQueueRange,
    },
    /// `draw_skybox`.
    Skybox,
    /// `submit`.
    Submit,
}

/// The recording double. Configure the lights culling should report, hand
/// it to the pipeline, then inspect.
#[derive(Debug, Default)]
pub struct RecordingContext {
    /// Lights returned from every `cull` call.
    pub visible_lights: Vec<VisibleLight>,
    events: Vec<FrameEvent>,
    cull_count: usize,
    live_targets: FxHashSet<PropId>,
}

impl RecordingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose culling reports `lights`.
    #[must_use]
    pub fn with_lights(lights: Vec<VisibleLight>) -> Self {
        Self {
            visible_lights: lights,
            ..Self::default()
        }
    }

    /// Everything observed so far, in call order.
    #[must_use]
    pub fn events(&self) -> &[FrameEvent] {
        &self.events
    }

    /// Labels of executed batches, in execution order.
    #[must_use]
    pub fn batch_labels(&self) -> Vec<&'static str> {
        self.batches().map(CommandBuffer::label).collect()
    }

    /// Executed batches, in execution order.
    pub fn batches(&self) -> impl Iterator<Item = &CommandBuffer> {
        self.events.iter().filter_map(|event| match event {
            FrameEvent::Batch(buffer) => Some(buffer),
            _ => None,
        })
    }

    /// The first executed batch with the given label.
    #[must_use]
    pub fn find_batch(&self, label: &str) -> Option<&CommandBuffer> {
        self.batches().find(|buffer| buffer.label() == label)
    }

    /// Every executed command, flattened across batches in order.
    pub fn commands(&self) -> impl Iterator<Item = &GpuCommand> {
        self.batches().flat_map(CommandBuffer::iter)
    }

    /// Targets allocated but not yet released. Zero after a well-behaved
    /// frame.
    #[must_use]
    pub fn live_target_count(&self) -> usize {
        self.live_targets.len()
    }

    #[must_use]
    pub fn cull_count(&self) -> usize {
        self.cull_count
    }

    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, FrameEvent::Submit))
            .count()
    }

    /// Index of the first event matching `predicate`.
    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&FrameEvent) -> bool,
    {
        self.events.iter().position(predicate)
    }
}

impl RenderContext for RecordingContext {
    fn cull(&mut self, _params: &CullingParams) -> CullingResults {
        self.cull_count += 1;
        CullingResults {
            visible_lights: self.visible_lights.clone(),
        }
    }

    fn setup_camera(&mut self, camera: &RenderCamera) {
        self.events.push(FrameEvent::CameraSetup {
            width: camera.pixel_width,
            height: camera.pixel_height,
        });
    }

    fn execute(&mut self, buffer: CommandBuffer) {
        for command in &buffer {
            match command {
                GpuCommand::AllocateTarget { id, .. } => {
                    self.live_targets.insert(*id);
                }
                GpuCommand::ReleaseTarget { id } => {
                    self.live_targets.remove(id);
                }
                _ => {}
            }
        }
        self.events.push(FrameEvent::Batch(buffer));
    }

    fn draw_renderers(&mut self, _culling: &CullingResults, settings: &DrawSettings) {
        self.events.push(FrameEvent::Draw {
            pass_tag: settings.pass_tag,
            sorting: settings.sorting,
            queue: settings.queue,
        });
    }

    fn draw_skybox(&mut self, _camera: &RenderCamera) {
        self.events.push(FrameEvent::Skybox);
    }

    fn submit(&mut self) {
        self.events.push(FrameEvent::Submit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::command::TargetDesc;

    #[test]
    fn test_tracks_target_lifetime() {
        let mut ctx = RecordingContext::new();
        let id = PropId::named("_Scratch");
        ctx.execute(CommandBuffer::new(
            "alloc",
            vec![GpuCommand::AllocateTarget {
                id,
                desc: TargetDesc::new(4, 4, wgpu::TextureFormat::Rgba8Unorm),
            }],
        ));
        assert_eq!(ctx.live_target_count(), 1);

        ctx.execute(CommandBuffer::new(
            "release",
            vec![GpuCommand::ReleaseTarget { id }],
        ));
        assert_eq!(ctx.live_target_count(), 0);
    }

    #[test]
    fn test_event_stream_preserves_call_order() {
        let mut ctx = RecordingContext::new();
        ctx.execute(CommandBuffer::new("first", Vec::new()));
        ctx.draw_skybox(&RenderCamera::new(
            glam::Mat4::IDENTITY,
            glam::Mat4::IDENTITY,
            8,
            8,
        ));
        ctx.submit();

        assert!(matches!(ctx.events()[0], FrameEvent::Batch(_)));
        assert!(matches!(ctx.events()[1], FrameEvent::Skybox));
        assert!(matches!(ctx.events()[2], FrameEvent::Submit));
        assert_eq!(ctx.submit_count(), 1);
    }
}
