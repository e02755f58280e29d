//! Render Camera
//!
//! A fully resolved camera as the pipeline consumes it: pose, projection and
//! pixel size, with no scene-graph ties. Culling-parameter extraction is the
//! per-camera precondition — when it fails the camera's frame is abandoned
//! before any resource is allocated.

use glam::{Mat4, Vec3};

/// Camera state for one rendered view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCamera {
    /// Camera pose: transforms camera space into world space.
    pub camera_to_world: Mat4,
    pub projection: Mat4,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Inputs the host needs to compute visibility for one camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingParams {
    pub view_proj: Mat4,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl RenderCamera {
    #[must_use]
    pub fn new(
        camera_to_world: Mat4,
        projection: Mat4,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Self {
        Self {
            camera_to_world,
            projection,
            pixel_width,
            pixel_height,
        }
    }

    /// Perspective camera looking from `eye` at `target`.
    #[must_use]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        near: f32,
        far: f32,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Self {
        let aspect = pixel_width as f32 / pixel_height.max(1) as f32;
        Self {
            camera_to_world: Mat4::look_at_rh(eye, target, up).inverse(),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            pixel_width,
            pixel_height,
        }
    }

    /// View matrix: transforms world space into camera space.
    #[must_use]
    pub fn world_to_camera(&self) -> Mat4 {
        self.camera_to_world.inverse()
    }

    /// Inverse projection, used by the sphere tracer to unproject pixels.
    #[must_use]
    pub fn inverse_projection(&self) -> Mat4 {
        self.projection.inverse()
    }

    /// World-space view direction (the -Z axis of the camera pose).
    #[must_use]
    pub fn view_direction(&self) -> Vec3 {
        -self.camera_to_world.z_axis.truncate().normalize_or_zero()
    }

    /// Extracts culling parameters, or `None` when the camera cannot
    /// render: a zero-sized viewport, non-finite matrices, or a singular
    /// projection.
    #[must_use]
    pub fn culling_params(&self) -> Option<CullingParams> {
        if self.pixel_width == 0 || self.pixel_height == 0 {
            return None;
        }
        if !self.camera_to_world.is_finite() || !self.projection.is_finite() {
            return None;
        }
        if self.projection.determinant() == 0.0 || self.camera_to_world.determinant() == 0.0 {
            return None;
        }
        Some(CullingParams {
            view_proj: self.projection * self.world_to_camera(),
            pixel_width: self.pixel_width,
            pixel_height: self.pixel_height,
        })
    }
}
