//! Frame and object state
//!
//! - SceneState: per-frame pipeline decisions derived from host settings
//! - ObjectState: per-object color classification
//! - Material: GPU surface parameters and image resolution

pub mod material;
pub mod object_state;
pub mod scene_state;

pub use material::{Material, MaterialImage, get_material_image};
pub use object_state::{MaterialSubType, ObjectState};
pub use scene_state::SceneState;
