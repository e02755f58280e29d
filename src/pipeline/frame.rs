//! Frame Resource Manager
//!
//! The seven render targets a camera frame lives in. All of them are
//! allocated up front, named, point-filtered and linear; all of them are
//! released in the present pass. [`FrameTargets::release`] consumes the
//! value, so a frame cannot release twice, and the type is `#[must_use]`
//! so a frame cannot silently forget to.
//!
//! # Target table
//!
//! | Target | Format | Role |
//! |--------|--------|------|
//! | `_GBuffer0` | `Rgba8Unorm` | albedo channel, storage write |
//! | `_GBuffer1` | `Rgba16Float` | normal/material channel, storage write |
//! | `_SdfShadowMask` | `R32Float` | sphere-traced soft shadow mask |
//! | `_SdfLinearDepth` | `R32Float` | sphere-traced linear depth |
//! | `_CameraDepth` | `Depth24Plus` | authoritative hardware depth |
//! | `_SceneColor` | `Rgba8Unorm` | pre-fog color accumulation |
//! | `_FinalColor` | `Rgba8Unorm` | post-fog color accumulation |

use glam::Vec4;
use smallvec::smallvec;

use crate::gpu::command::{ClearFlags, GpuCommand, TargetDesc, TargetRef};
use crate::gpu::prop::PropId;

pub const GBUFFER0: &str = "_GBuffer0";
pub const GBUFFER1: &str = "_GBuffer1";
pub const SHADOW_MASK: &str = "_SdfShadowMask";
pub const LINEAR_DEPTH: &str = "_SdfLinearDepth";
pub const CAMERA_DEPTH: &str = "_CameraDepth";
pub const SCENE_COLOR: &str = "_SceneColor";
pub const FINAL_COLOR: &str = "_FinalColor";

pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
// The normal channel keeps extra precision and must stay storage-compatible
// for the sphere tracer, hence half-float over a 10-bit packed format.
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const LINEAR_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Handles to one frame's target set.
#[must_use = "frame targets must be released through the present pass"]
#[derive(Debug)]
pub struct FrameTargets {
    pub gbuffer0: PropId,
    pub gbuffer1: PropId,
    pub shadow_mask: PropId,
    pub linear_depth: PropId,
    pub depth: PropId,
    pub scene_color: PropId,
    pub final_color: PropId,
    width: u32,
    height: u32,
}

impl FrameTargets {
    /// Creates the handle set for a camera viewport. No GPU work happens
    /// here; [`setup_commands`](Self::setup_commands) carries it.
    pub fn allocate(width: u32, height: u32) -> Self {
        Self {
            gbuffer0: PropId::named(GBUFFER0),
            gbuffer1: PropId::named(GBUFFER1),
            shadow_mask: PropId::named(SHADOW_MASK),
            linear_depth: PropId::named(LINEAR_DEPTH),
            depth: PropId::named(CAMERA_DEPTH),
            scene_color: PropId::named(SCENE_COLOR),
            final_color: PropId::named(FINAL_COLOR),
            width,
            height,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Allocation plus the frame-start clear sequence: first the linear
    /// depth target together with hardware depth, then both G-buffer
    /// channels together with depth.
    #[must_use]
    pub fn setup_commands(&self) -> Vec<GpuCommand> {
        let size = |format: wgpu::TextureFormat| TargetDesc::new(self.width, self.height, format);
        vec![
            GpuCommand::AllocateTarget {
                id: self.gbuffer0,
                desc: size(ALBEDO_FORMAT).with_storage(),
            },
            GpuCommand::AllocateTarget {
                id: self.gbuffer1,
                desc: size(NORMAL_FORMAT).with_storage(),
            },
            GpuCommand::AllocateTarget {
                id: self.shadow_mask,
                desc: size(MASK_FORMAT).with_storage(),
            },
            GpuCommand::AllocateTarget {
                id: self.linear_depth,
                desc: size(LINEAR_DEPTH_FORMAT).with_storage(),
            },
            GpuCommand::AllocateTarget {
                id: self.scene_color,
                desc: size(COLOR_FORMAT).with_storage(),
            },
            GpuCommand::AllocateTarget {
                id: self.final_color,
                desc: size(COLOR_FORMAT),
            },
            GpuCommand::AllocateTarget {
                id: self.depth,
                desc: size(DEPTH_FORMAT),
            },
            GpuCommand::SetRenderTarget {
                colors: smallvec![TargetRef::Named(self.linear_depth)],
                depth: Some(TargetRef::Named(self.depth)),
            },
            GpuCommand::Clear {
                flags: ClearFlags::COLOR | ClearFlags::DEPTH,
                color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            },
            GpuCommand::SetRenderTarget {
                colors: smallvec![
                    TargetRef::Named(self.gbuffer0),
                    TargetRef::Named(self.gbuffer1),
                ],
                depth: Some(TargetRef::Named(self.depth)),
            },
            GpuCommand::Clear {
                flags: ClearFlags::COLOR | ClearFlags::DEPTH,
                color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            },
        ]
    }

    /// Release commands for exactly the targets this frame allocated.
    /// Consumes the frame: release happens once, and only once.
    #[must_use]
    pub fn release(self) -> Vec<GpuCommand> {
        [
            self.gbuffer0,
            self.gbuffer1,
            self.shadow_mask,
            self.linear_depth,
            self.scene_color,
            self.final_color,
            self.depth,
        ]
        .into_iter()
        .map(|id| GpuCommand::ReleaseTarget { id })
        .collect()
    }
}
