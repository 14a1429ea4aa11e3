//! Host scene input
//!
//! Read-only data the host hands to the pipeline every frame:
//! - FrameInput: resolution, targets and global settings
//! - CameraSettings / DofSettings: view and lens
//! - ShadingSettings / DisplaySettings: viewport shading options
//! - DrawableObject / MaterialData / ImageRef: the visible objects

pub mod camera;
pub mod frame;
pub mod object;
pub mod shading;

pub use camera::{CameraSettings, DofSettings};
pub use frame::{FrameInput, ViewportTargets};
pub use object::{
    DisplayType, DrawableObject, Extension, ImageNode, ImageRef, ImageTexture, ImageUser,
    Interpolation, MaterialData, ObjectBatches, ObjectFlags, ObjectMode,
};
pub use shading::{
    AntiAliasingMode, CavityType, DisplaySettings, ImagePaintSettings, PaintMode, ShadingColor,
    ShadingFlags, ShadingSettings,
};
