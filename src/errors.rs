//! Error Types
//!
//! This module defines the error types surfaced by the workbench pipeline.
//!
//! # Overview
//!
//! The main error type [`WorkbenchError`] covers the three failure modes of a
//! frame:
//! - Shader variant compilation failures (fatal, no fallback variant)
//! - GPU resource allocation failures (the frame is dropped)
//! - Configuration defects (unsupported variant or pass wiring)
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, WorkbenchError>`.
//!
//! ```rust,ignore
//! use workbench::errors::{WorkbenchError, Result};
//!
//! fn draw_frame() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the workbench pipeline.
///
/// None of these are retried internally. They propagate to the caller that
/// drives the frame, which decides what to show for the failed frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkbenchError {
    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// The backend failed to compile a shader variant.
    ///
    /// A missing variant is a build defect, so there is no substitute shader.
    #[error("Failed to compile shader '{shader}': {reason}")]
    ShaderCompile {
        /// Logical name of the shader variant
        shader: String,
        /// Backend-provided failure description
        reason: String,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A texture, buffer or framebuffer could not be allocated.
    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocation(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// An unsupported combination was requested (programming defect).
    #[error("Invalid pipeline configuration: {0}")]
    Configuration(String),
}

/// Alias for `Result<T, WorkbenchError>`.
pub type Result<T> = std::result::Result<T, WorkbenchError>;
