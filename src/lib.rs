#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod exec;
pub mod gpu;
pub mod pipeline;
pub mod scene;
pub mod settings;

pub use errors::{PipelineError, Result};
pub use exec::{RecordingContext, WgpuExecutor};
pub use gpu::{CommandBuffer, GpuCommand, KernelRef, PropId, RenderContext, TargetDesc, TargetRef};
pub use pipeline::RaymarchPipeline;
pub use pipeline::records::{PRIMITIVE_SCHEMA_VERSION, PrimitiveRecord};
pub use scene::{
    Operation, PrimitiveDesc, PrimitiveKey, PrimitiveKind, PrimitiveRegistry, PrimitiveTransform,
    RenderCamera, VisibleLight,
};
pub use settings::PipelineSettings;
