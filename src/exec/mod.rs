//! Execution Contexts
//!
//! Two [`RenderContext`](crate::gpu::context::RenderContext)
//! implementations: [`RecordingContext`] captures a frame as data for
//! inspection and tests, [`WgpuExecutor`] runs it on a device.

pub mod recording;
pub mod wgpu;

pub use recording::{FrameEvent, RecordingContext};
pub use wgpu::{EffectDesc, KernelDesc, NullRaster, RasterBackend, RasterTargets, WgpuExecutor};
