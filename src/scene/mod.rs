//! Scene-Facing Types
//!
//! Everything the host scene hands the pipeline per frame:
//! - Primitive: SDF primitive kinds, operations and descriptors
//! - PrimitiveRegistry: explicit primitive storage with snapshot-on-demand
//! - RenderCamera: resolved camera state plus culling preconditions
//! - VisibleLight: culled lights in visibility order

pub mod camera;
pub mod light;
pub mod primitive;
pub mod registry;

pub use camera::{CullingParams, RenderCamera};
pub use light::{LightKind, VisibleLight};
pub use primitive::{Operation, PrimitiveDesc, PrimitiveKind, PrimitiveTransform};
pub use registry::{Parentage, PrimitiveKey, PrimitiveRegistry, PrimitiveSnapshot};
