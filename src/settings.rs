//! Pipeline Settings
//!
//! Configuration the pipeline consumes read-only, typically deserialized
//! from the host's asset layer. Names of full-screen effects and of the
//! sphere-trace compute program are plain strings here; the pipeline
//! interns them once at construction.
//!
//! # Fields
//!
//! | Field | Description | Range | Default |
//! |-------|-------------|-------|---------|
//! | `fog_density` | Exponential fog density | any | `0.05` |
//! | `fog_color` | Fog color, linear RGBA | any | gray |
//! | `min_shadow_distance` | Marching start for shadow rays | `0.0001..=1` | `0.1` |
//! | `max_shadow_distance` | Marching cutoff for shadow rays | `0.001..=100` | `80` |
//! | `soft_shadows_factor` | Penumbra sharpness | `1..=64` | `16` |
//! | `shadow_intensity` | Darkest shadow attenuation | `0..=1` | `0.2` |
//! | `epsilon` | Sphere-trace hit threshold | `0.00001..=1` | `0.001` |
//! | `effects` | Full-screen effect names | — | see [`EffectNames`] |
//! | `sphere_trace_program` | Compute program name, `None` disables SDF | — | `None` |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use selenite::settings::PipelineSettings;
//!
//! let settings = PipelineSettings {
//!     sphere_trace_program: Some("SphereTrace".into()),
//!     fog_density: 0.02,
//!     ..Default::default()
//! };
//! let pipeline = selenite::RaymarchPipeline::new(settings)?;
//! ```

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};

/// Names of the full-screen effects the pipeline invokes.
///
/// The host registers a render pipeline under each name with its executor;
/// the pipeline itself never sees shader code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectNames {
    /// Copies camera-target depth onto itself after transparency.
    pub copy_depth: String,
    /// Remaps sphere-traced linear depth into the hardware depth target.
    pub copy_ray_depth: String,
    /// Deferred shading resolve over the G-buffer.
    pub deferred: String,
    /// Depth-based fog composite.
    pub fog: String,
}

impl Default for EffectNames {
    fn default() -> Self {
        Self {
            copy_depth: "CopyDepth".into(),
            copy_ray_depth: "CopyRaymarchDepth".into(),
            deferred: "DeferredShading".into(),
            fog: "Fog".into(),
        }
    }
}

/// Read-only configuration for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub fog_density: f32,
    /// Linear RGBA; stored as an array so settings files stay plain.
    pub fog_color: [f32; 4],
    pub min_shadow_distance: f32,
    pub max_shadow_distance: f32,
    pub soft_shadows_factor: f32,
    pub shadow_intensity: f32,
    pub epsilon: f32,
    pub effects: EffectNames,
    /// Compute program for the sphere-trace stage. `None` leaves the SDF
    /// scene out of the frame entirely.
    pub sphere_trace_program: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fog_density: 0.05,
            fog_color: [0.5, 0.5, 0.5, 1.0],
            min_shadow_distance: 0.1,
            max_shadow_distance: 80.0,
            soft_shadows_factor: 16.0,
            shadow_intensity: 0.2,
            epsilon: 0.001,
            effects: EffectNames::default(),
            sphere_trace_program: None,
        }
    }
}

impl PipelineSettings {
    /// Checks every documented range; called by pipeline construction.
    pub fn validate(&self) -> Result<()> {
        check("min_shadow_distance", self.min_shadow_distance, 0.0001, 1.0)?;
        check("max_shadow_distance", self.max_shadow_distance, 0.001, 100.0)?;
        check("soft_shadows_factor", self.soft_shadows_factor, 1.0, 64.0)?;
        check("shadow_intensity", self.shadow_intensity, 0.0, 1.0)?;
        check("epsilon", self.epsilon, 0.000_01, 1.0)?;
        Ok(())
    }

    /// The packed `_ShadowParams` vector: (min distance, max distance,
    /// softness, intensity).
    #[must_use]
    pub fn shadow_params(&self) -> Vec4 {
        Vec4::new(
            self.min_shadow_distance,
            self.max_shadow_distance,
            self.soft_shadows_factor,
            self.shadow_intensity,
        )
    }

    #[must_use]
    pub fn fog_color_vec(&self) -> Vec4 {
        Vec4::from_array(self.fog_color)
    }
}

fn check(name: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(PipelineError::SettingOutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
