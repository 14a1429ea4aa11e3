//! Pass graph building blocks
//!
//! Provides:
//! - RenderPass / SubPass: recorded command lists replayed by the backend
//! - Slot / Binding: late-bound resource references inside commands
//! - TransientTexturePool / TextureFromPool: per-frame pooled targets
//! - PersistentTexture: targets that survive across frames
//! - Framebuffer: cached attachment sets
//! - UniformBuffer / StorageVecBuffer: CPU-mirrored GPU buffers

pub mod buffer;
pub mod framebuffer;
pub mod pass;
pub mod slot;
pub mod texture;
pub mod transient_pool;

pub use buffer::{StorageVecBuffer, UniformBuffer};
pub use framebuffer::Framebuffer;
pub use pass::{
    BatchHandle, DrawCall, DrawState, PassCommand, PassRecorder, PushConstant, RenderPass,
    ResourceHandle, SubPass, SubPassId,
};
pub use slot::{Binding, BufferSlot, Slot, TextureSlot};
pub use texture::PersistentTexture;
pub use transient_pool::{TextureFromPool, TransientTexturePool};
