//! Renderer Module
//!
//! - [`backend`]: the device seam and its headless implementation
//! - [`graph`]: recorded passes, late-bound slots, pooled and persistent targets
//! - [`pipeline`]: shader variant keys, source generation and the variant cache
//! - [`state`]: per-frame scene state, per-object classification and materials
//! - [`resources`]: targets and buffers shared by every pass
//! - [`passes`]: the workbench passes

pub mod backend;
pub mod graph;
pub mod passes;
pub mod pipeline;
pub mod resources;
pub mod state;

pub use backend::{GpuBackend, HeadlessBackend};
pub use resources::SceneResources;
