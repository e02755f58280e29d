//! Visible Light Buffer
//!
//! Fixed-size light arrays uploaded as global shader vectors for the
//! deferred resolve. Directional lights store their negated forward axis
//! (pointing toward the light, w = 0); point lights store their world
//! position (w = 1). Lights beyond the cap are ignored in visibility order.

use glam::Vec4;

use crate::scene::light::{LightKind, VisibleLight};

/// Upper bound baked into the deferred shader's uniform arrays.
pub const MAX_VISIBLE_LIGHTS: usize = 4;

/// Packed per-camera light data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightBuffer {
    colors: [Vec4; MAX_VISIBLE_LIGHTS],
    directions_or_positions: [Vec4; MAX_VISIBLE_LIGHTS],
    count: usize,
}

impl LightBuffer {
    /// Packs the first [`MAX_VISIBLE_LIGHTS`] visible lights; unused slots
    /// stay zeroed so stale data never reaches the shader.
    #[must_use]
    pub fn pack(lights: &[VisibleLight]) -> Self {
        let mut buffer = Self {
            colors: [Vec4::ZERO; MAX_VISIBLE_LIGHTS],
            directions_or_positions: [Vec4::ZERO; MAX_VISIBLE_LIGHTS],
            count: 0,
        };
        for light in lights.iter().take(MAX_VISIBLE_LIGHTS) {
            buffer.colors[buffer.count] = light.final_color;
            buffer.directions_or_positions[buffer.count] = match light.kind {
                LightKind::Directional => (-light.forward()).extend(0.0),
                LightKind::Point => light.position().extend(1.0),
            };
            buffer.count += 1;
        }
        buffer
    }

    /// How many slots carry real lights.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn colors(&self) -> &[Vec4; MAX_VISIBLE_LIGHTS] {
        &self.colors
    }

    #[must_use]
    pub fn directions_or_positions(&self) -> &[Vec4; MAX_VISIBLE_LIGHTS] {
        &self.directions_or_positions
    }
}
