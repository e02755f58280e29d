//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`PipelineError`] covers all failure modes including:
//! - GPU initialization failures
//! - Pipeline configuration errors
//! - Scene registry errors
//! - GPU program lookup errors
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, PipelineError>`. Per-frame rendering never
//! returns an error: frame-local problems (failed culling, missing compute
//! kernel, empty primitive set) downgrade to skipped work and a log line.
//!
//! ```rust,ignore
//! use selenite::errors::{PipelineError, Result};
//!
//! fn build_pipeline() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the selenite pipeline.
///
/// This enum covers all possible error conditions that can occur
/// during pipeline construction and scene registration. Each variant
/// provides specific context about what went wrong.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// A compute kernel or full-screen effect was invoked by a name that
    /// was never registered with the executor.
    #[error("{kind} not registered: {name}")]
    ProgramNotRegistered {
        /// What kind of program was looked up ("compute kernel", "effect")
        kind: &'static str,
        /// The name the lookup used
        name: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A pipeline setting lies outside its documented range.
    #[error("Setting `{name}` out of range: {value} (allowed {min}..={max})")]
    SettingOutOfRange {
        /// The offending field
        name: &'static str,
        /// The rejected value
        value: f32,
        /// Inclusive lower bound
        min: f32,
        /// Inclusive upper bound
        max: f32,
    },

    // ========================================================================
    // Scene Registry Errors
    // ========================================================================
    /// A registry operation referenced a primitive key that no longer
    /// exists (already removed, or from another registry).
    #[error("Unknown primitive key: {context}")]
    UnknownPrimitive {
        /// Description of the operation that failed
        context: String,
    },
}

/// Alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;
