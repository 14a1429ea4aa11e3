#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod engine;
pub mod errors;
pub mod renderer;
pub mod scene;
pub mod utils;

pub use engine::{FrameStatus, WorkbenchEngine};
pub use errors::{Result, WorkbenchError};
pub use renderer::backend::{GpuBackend, HeadlessBackend};
pub use renderer::pipeline::ShaderCache;
pub use renderer::state::{Material, ObjectState, SceneState};
pub use scene::{DrawableObject, FrameInput, MaterialData, ViewportTargets};
