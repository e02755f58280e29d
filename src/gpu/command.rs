//! GPU Command Model
//!
//! The pipeline never talks to a graphics API while it decides what a frame
//! looks like. Each pass builds a plain `Vec<GpuCommand>` and freezes it
//! into a [`CommandBuffer`] — a named, immutable batch that is handed to the
//! context for execution. Recording and submission are therefore two
//! separate phases with nothing shared between them but data.
//!
//! # Command groups
//!
//! | Group | Commands |
//! |-------|----------|
//! | Resource lifetime | [`AllocateTarget`], [`ReleaseTarget`] |
//! | Target binding | [`SetRenderTarget`], [`Clear`] |
//! | Full screen | [`Blit`] |
//! | Compute | [`SetComputeTexture`], [`SetComputeBuffer`], [`SetComputeMatrix`], [`SetComputeVector`], [`SetComputeFloat`], [`SetComputeInt`], [`DispatchCompute`] |
//! | Globals | [`SetGlobalVectorArray`], [`SetGlobalFloat`], [`SetGlobalColor`] |
//!
//! [`AllocateTarget`]: GpuCommand::AllocateTarget
//! [`ReleaseTarget`]: GpuCommand::ReleaseTarget
//! [`SetRenderTarget`]: GpuCommand::SetRenderTarget
//! [`Clear`]: GpuCommand::Clear
//! [`Blit`]: GpuCommand::Blit
//! [`SetComputeTexture`]: GpuCommand::SetComputeTexture
//! [`SetComputeBuffer`]: GpuCommand::SetComputeBuffer
//! [`SetComputeMatrix`]: GpuCommand::SetComputeMatrix
//! [`SetComputeVector`]: GpuCommand::SetComputeVector
//! [`SetComputeFloat`]: GpuCommand::SetComputeFloat
//! [`SetComputeInt`]: GpuCommand::SetComputeInt
//! [`DispatchCompute`]: GpuCommand::DispatchCompute
//! [`SetGlobalVectorArray`]: GpuCommand::SetGlobalVectorArray
//! [`SetGlobalFloat`]: GpuCommand::SetGlobalFloat
//! [`SetGlobalColor`]: GpuCommand::SetGlobalColor

use bitflags::bitflags;
use glam::{Mat4, Vec4};
use smallvec::SmallVec;

use crate::gpu::prop::PropId;

bitflags! {
    /// What a [`GpuCommand::Clear`] wipes on the currently bound targets.
    ///
    /// Depth always clears to 1.0 (far plane); color clears to the value
    /// carried by the command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        /// Clear every bound color target.
        const COLOR = 1 << 0;
        /// Clear the bound depth target.
        const DEPTH = 1 << 1;
    }
}

/// Description of a frame-scoped render target.
///
/// Targets are point-filtered and live in linear color space; the managed
/// set never uses sRGB views. `storage` marks targets the sphere-trace
/// kernel writes through storage bindings, which restricts the format to
/// storage-compatible ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
    pub storage: bool,
}

impl TargetDesc {
    /// A point-filtered target without storage access.
    #[must_use]
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            filter: wgpu::FilterMode::Nearest,
            storage: false,
        }
    }

    /// Marks the target writable by compute through a storage binding.
    #[must_use]
    pub fn with_storage(mut self) -> Self {
        self.storage = true;
        self
    }

    /// True when the format is a depth format and the target binds as a
    /// depth attachment instead of a color one.
    #[must_use]
    pub fn is_depth(&self) -> bool {
        self.format.is_depth_stencil_format()
    }
}

/// One end of a blit or target binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetRef {
    /// A named frame-scoped target.
    Named(PropId),
    /// The camera's own output surface, owned by the host.
    CameraTarget,
}

/// A compute kernel addressed by program name and kernel index.
///
/// The index is carried explicitly by every command that needs it; no
/// global state decides which kernel a bind applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelRef {
    pub program: PropId,
    pub index: u32,
}

/// A single typed GPU command.
///
/// Commands are self-contained: buffer uploads own their bytes, so a frozen
/// batch can be inspected, replayed or executed without reaching back into
/// pipeline state.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Allocate a named frame-scoped target.
    AllocateTarget { id: PropId, desc: TargetDesc },
    /// Release a named frame-scoped target.
    ReleaseTarget { id: PropId },
    /// Bind color targets (multiple render targets allowed) plus depth.
    SetRenderTarget {
        colors: SmallVec<[TargetRef; 2]>,
        depth: Option<TargetRef>,
    },
    /// Clear the currently bound targets.
    Clear { flags: ClearFlags, color: Vec4 },
    /// Run a full-screen effect into `dest`.
    ///
    /// `source` feeds the effect's main input when present; effects that
    /// read named targets instead (deferred shading, fog) pass `None`.
    /// `effect: None` is a plain copy.
    Blit {
        source: Option<TargetRef>,
        dest: TargetRef,
        effect: Option<PropId>,
    },
    /// Bind a named target to a kernel texture parameter.
    SetComputeTexture {
        kernel: KernelRef,
        param: PropId,
        target: PropId,
    },
    /// Upload a structured buffer and bind it to a kernel parameter.
    SetComputeBuffer {
        kernel: KernelRef,
        param: PropId,
        data: Box<[u8]>,
        stride: u32,
    },
    /// Set a program-wide matrix parameter.
    SetComputeMatrix {
        program: PropId,
        param: PropId,
        value: Mat4,
    },
    /// Set a program-wide vector parameter.
    SetComputeVector {
        program: PropId,
        param: PropId,
        value: Vec4,
    },
    /// Set a program-wide float parameter.
    SetComputeFloat {
        program: PropId,
        param: PropId,
        value: f32,
    },
    /// Set a program-wide integer parameter.
    SetComputeInt {
        program: PropId,
        param: PropId,
        value: i32,
    },
    /// Dispatch a kernel with the given workgroup counts.
    DispatchCompute { kernel: KernelRef, groups: [u32; 3] },
    /// Set a global vector-array uniform visible to every effect.
    SetGlobalVectorArray { param: PropId, values: Box<[Vec4]> },
    /// Set a global float uniform visible to every effect.
    SetGlobalFloat { param: PropId, value: f32 },
    /// Set a global color uniform visible to every effect.
    SetGlobalColor { param: PropId, value: Vec4 },
}

impl GpuCommand {
    /// Element count of a structured buffer upload, `None` for other
    /// commands.
    #[must_use]
    pub fn buffer_len(&self) -> Option<usize> {
        match self {
            Self::SetComputeBuffer { data, stride, .. } if *stride > 0 => {
                Some(data.len() / *stride as usize)
            }
            _ => None,
        }
    }
}

/// A named, immutable batch of commands.
///
/// Built once from a `Vec<GpuCommand>` and never mutated afterwards; the
/// context receives batches in emission order and executes each batch's
/// commands front to back.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBuffer {
    label: &'static str,
    commands: Box<[GpuCommand]>,
}

impl CommandBuffer {
    /// Freezes `commands` into a batch.
    #[must_use]
    pub fn new(label: &'static str, commands: Vec<GpuCommand>) -> Self {
        Self {
            label,
            commands: commands.into_boxed_slice(),
        }
    }

    /// The batch label, used for logs and frame inspection.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The commands in execution order.
    #[must_use]
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GpuCommand> {
        self.commands.iter()
    }
}

impl<'a> IntoIterator for &'a CommandBuffer {
    type Item = &'a GpuCommand;
    type IntoIter = std::slice::Iter<'a, GpuCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
