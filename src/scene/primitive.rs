//! SDF Primitive Definitions
//!
//! `PrimitiveKind` and `Operation` are the closed vocabulary the sphere-trace
//! kernel understands; both travel to the GPU as `i32` codes. `Operation`
//! additionally defines the compositing order the ordered primitive buffer
//! is sorted by.

use glam::{EulerRot, Mat4, Vec3};

/// Shape of an SDF primitive.
///
/// The numeric code is part of the GPU record schema.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum PrimitiveKind {
    Sphere = 0,
    Cube = 1,
    Torus = 2,
}

impl PrimitiveKind {
    /// The code stored in the GPU record.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Kind name (for debugging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sphere => "Sphere",
            Self::Cube => "Cube",
            Self::Torus => "Torus",
        }
    }
}

/// Compositing verb applied when a primitive joins the SDF scene.
///
/// The kernel folds primitives left to right in buffer order, so the order
/// below is a hard contract: the collector stable-sorts by it, and the
/// kernel relies on every `Cut` arriving after the surfaces it carves.
///
/// # Compositing Overview
///
/// | Operation | Order | Effect on the distance field |
/// |-----------|-------|------------------------------|
/// | `None` | 0 | Plain union with the scene |
/// | `Blend` | 1 | Smooth union, weighted by blend strength |
/// | `Cut` | 2 | Subtracts the primitive's volume |
/// | `Mask` | 3 | Intersects the scene with the primitive |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[repr(i32)]
pub enum Operation {
    /// Plain union with the scene.
    None = 0,

    /// Smooth union; the blend strength controls the falloff width.
    Blend = 1,

    /// Subtracts the primitive's volume from everything before it.
    Cut = 2,

    /// Keeps only the scene volume inside the primitive.
    Mask = 3,
}

impl Operation {
    /// Position in the buffer compositing order (used for sorting).
    #[inline]
    #[must_use]
    pub const fn compositing_order(self) -> i32 {
        self as i32
    }

    /// The code stored in the GPU record.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Operation name (for debugging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Blend => "Blend",
            Self::Cut => "Cut",
            Self::Mask => "Mask",
        }
    }
}

/// World placement of a primitive.
///
/// `scale` is local; the effective scale seen by the kernel is the local
/// scale multiplied component-wise by the parent's local scale, one level
/// deep. Rotation is Euler radians applied Z, then X, then Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveTransform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl PrimitiveTransform {
    /// Rotation matrix for the GPU record (the kernel inverts it to march
    /// in object space).
    #[must_use]
    pub fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        )
    }
}

impl Default for PrimitiveTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Everything the scene declares about one primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveDesc {
    pub kind: PrimitiveKind,
    pub operation: Operation,
    /// Surface color, linear RGB.
    pub color: Vec3,
    /// Smooth-blend strength, expected range 0..=1.
    pub blend_strength: f32,
    pub transform: PrimitiveTransform,
}

impl Default for PrimitiveDesc {
    fn default() -> Self {
        Self {
            kind: PrimitiveKind::Sphere,
            operation: Operation::None,
            color: Vec3::ONE,
            blend_strength: 0.0,
            transform: PrimitiveTransform::default(),
        }
    }
}
