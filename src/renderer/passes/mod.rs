//! Render passes
//!
//! Each pass follows the same two-phase protocol:
//!
//! - `sync`: record commands (shaders, state, late-bound resource slots).
//! - `draw`: acquire transient targets, ensure framebuffers, submit.
//!
//! The engine calls them in a fixed order:
//!
//! ```text
//! Opaque → Transparent → TransparentDepth → Outline → Dof → AntiAliasing
//! ```

pub mod antialiasing;
pub mod cavity;
pub mod dof;
pub mod mesh;
pub mod opaque;
pub mod outline;
pub mod transparent;
pub mod transparent_depth;

pub use antialiasing::AntiAliasingPass;
pub use cavity::CavityEffect;
pub use dof::DofPass;
pub use mesh::MeshPass;
pub use opaque::OpaquePass;
pub use outline::OutlinePass;
pub use transparent::TransparentPass;
pub use transparent_depth::TransparentDepthPass;

use crate::errors::{Result, WorkbenchError};
use crate::renderer::backend::TextureHandle;
use crate::renderer::graph::TransientTexturePool;
use crate::renderer::graph::TextureFromPool;

/// Stencil bits written by the geometry passes.
pub struct StencilBits;

impl StencilBits {
    pub const BACKGROUND: u8 = 0;
    pub const OBJECT: u8 = 1 << 0;
    pub const OBJECT_IN_FRONT: u8 = 1 << 1;
    pub const OBJECT_ALL: u8 = Self::OBJECT | Self::OBJECT_IN_FRONT;
}

/// Handle of a frame texture that must have been acquired by now.
pub(crate) fn acquired(texture: &TextureFromPool, what: &str) -> Result<TextureHandle> {
    texture.handle().ok_or_else(|| {
        WorkbenchError::Configuration(format!("{what} texture used outside of draw"))
    })
}

/// Returns every listed texture to the pool.
pub(crate) fn release_all(pool: &mut TransientTexturePool, textures: &[&TextureFromPool]) {
    for texture in textures {
        texture.release(pool);
    }
}
