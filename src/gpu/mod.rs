//! GPU-Facing Contracts
//!
//! Provides:
//! - PropId: interned string-derived handles for targets, params and effects
//! - GpuCommand/CommandBuffer: the typed record-then-submit command model
//! - RenderContext: the trait the host engine implements
//! - DrawSettings/SortingCriteria/RenderQueueRange: renderer draw filters

pub mod command;
pub mod context;
pub mod prop;

pub use command::{ClearFlags, CommandBuffer, GpuCommand, KernelRef, TargetDesc, TargetRef};
pub use context::{CullingResults, DrawSettings, RenderContext, RenderQueueRange, SortingCriteria};
pub use prop::PropId;
