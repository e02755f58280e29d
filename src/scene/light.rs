//! Visible Lights
//!
//! Lights arrive from culling already resolved: a kind, a final color
//! (linear RGB premultiplied by intensity) and a world transform. The light
//! buffer reads only the transform's Z column (forward) for directional
//! lights and its translation for point lights.

use glam::{Mat4, Quat, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
}

/// One light the host found visible for the current camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleLight {
    pub kind: LightKind,
    /// Linear color premultiplied by intensity.
    pub final_color: Vec4,
    pub local_to_world: Mat4,
}

impl VisibleLight {
    /// Directional light shining along `direction`.
    #[must_use]
    pub fn directional(color: Vec3, intensity: f32, direction: Vec3) -> Self {
        let rotation = Quat::from_rotation_arc(Vec3::Z, direction.normalize_or(Vec3::Z));
        Self {
            kind: LightKind::Directional,
            final_color: (color * intensity).extend(1.0),
            local_to_world: Mat4::from_quat(rotation),
        }
    }

    /// Point light at `position`.
    #[must_use]
    pub fn point(color: Vec3, intensity: f32, position: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            final_color: (color * intensity).extend(1.0),
            local_to_world: Mat4::from_translation(position),
        }
    }

    /// The direction the light shines (Z column of the transform).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.local_to_world.z_axis.truncate()
    }

    /// World position (translation column of the transform).
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directional_forward_matches_direction() {
        let light = VisibleLight::directional(Vec3::ONE, 1.0, Vec3::new(0.0, -1.0, 0.0));
        assert!(light.forward().abs_diff_eq(Vec3::NEG_Y, 1e-6));
    }

    #[test]
    fn test_point_position_is_translation() {
        let light = VisibleLight::point(Vec3::ONE, 2.0, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_color_premultiplied_by_intensity() {
        let light = VisibleLight::point(Vec3::new(1.0, 0.5, 0.25), 2.0, Vec3::ZERO);
        assert_eq!(light.final_color, Vec4::new(2.0, 1.0, 0.5, 1.0));
    }
}
