//! GPU Backend Interface
//!
//! The workbench pipeline never talks to a graphics API directly. Everything
//! it needs from the device goes through [`GpuBackend`]: shader compilation,
//! texture / buffer / framebuffer lifetime, and pass submission.
//!
//! Resources are identified by `slotmap` keys issued by the backend. The
//! pipeline only stores and compares them; it never interprets their bits.
//!
//! Submission is fire-and-forget. The backend is expected to execute passes
//! in submission order, honouring the attachment and binding dependencies
//! expressed by each [`RenderPass`].
//!
//! [`HeadlessBackend`] is a complete in-memory implementation that records
//! every call. It is used by the test-suite and is handy for debugging pass
//! topology without a device.

mod headless;

pub use headless::{BackendStats, HeadlessBackend, Submission};

use glam::UVec2;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::graph::pass::RenderPass;
use crate::renderer::pipeline::shader_gen::ShaderSource;

slotmap::new_key_type! {
    /// A compiled shader program owned by the backend.
    pub struct ShaderHandle;
    /// A texture allocation owned by the backend.
    pub struct TextureHandle;
    /// A uniform or storage buffer owned by the backend.
    pub struct BufferHandle;
    /// A set of render attachments owned by the backend.
    pub struct FramebufferHandle;
}

// ─── Descriptors ──────────────────────────────────────────────────────────────

/// Descriptor for a 2D texture allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub mip_level_count: u32,
    pub label: &'static str,
}

impl TextureDesc {
    /// Usage shared by every offscreen target of the pipeline.
    pub const ATTACHMENT_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
        .union(wgpu::TextureUsages::TEXTURE_BINDING)
        .union(wgpu::TextureUsages::COPY_SRC)
        .union(wgpu::TextureUsages::COPY_DST);

    /// Creates a single-mip render target descriptor.
    #[must_use]
    pub fn target(label: &'static str, size: UVec2, format: wgpu::TextureFormat) -> Self {
        Self {
            width: size.x.max(1),
            height: size.y.max(1),
            format,
            usage: Self::ATTACHMENT_USAGE,
            mip_level_count: 1,
            label,
        }
    }

    /// Creates a sampled-only texture descriptor (lookup tables, noise).
    #[must_use]
    pub fn sampled(label: &'static str, size: UVec2, format: wgpu::TextureFormat) -> Self {
        Self {
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ..Self::target(label, size, format)
        }
    }

    #[must_use]
    pub fn with_mips(mut self, mip_level_count: u32) -> Self {
        self.mip_level_count = mip_level_count.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// Descriptor for a buffer allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: &'static str,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

/// Attachment set of a framebuffer.
///
/// Colors are bound in slot order; `None` depth means a color-only target.
/// Every attachment is bound at `mip_level`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub label: &'static str,
    pub depth: Option<TextureHandle>,
    pub colors: SmallVec<[TextureHandle; 4]>,
    pub mip_level: u32,
}

/// Sampler configuration attached to a texture binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
}

impl SamplerState {
    /// Nearest filtering, clamp-to-edge addressing.
    pub const DEFAULT: Self = Self {
        filter: wgpu::FilterMode::Nearest,
        address_mode: wgpu::AddressMode::ClampToEdge,
    };

    pub const LINEAR: Self = Self {
        filter: wgpu::FilterMode::Linear,
        address_mode: wgpu::AddressMode::ClampToEdge,
    };

    pub const NEAREST_REPEAT: Self = Self {
        filter: wgpu::FilterMode::Nearest,
        address_mode: wgpu::AddressMode::Repeat,
    };
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Value written by a texture clear.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Color(wgpu::Color),
    UInt(u32),
    DepthStencil { depth: f32, stencil: u32 },
}

// ─── Backend Trait ────────────────────────────────────────────────────────────

/// The device-facing collaborator of the pipeline.
///
/// All calls happen on the frame thread, strictly in the order the pipeline
/// issues them. `free_*` calls receive each handle exactly once.
pub trait GpuBackend {
    /// Compiles a shader from its assembled source. Blocking.
    fn compile_shader(&mut self, source: &ShaderSource) -> Result<ShaderHandle>;
    fn free_shader(&mut self, shader: ShaderHandle);

    fn allocate_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle>;
    /// Replaces the texel data of mip 0 with tightly packed `data`.
    fn upload_texture(&mut self, texture: TextureHandle, data: &[u8]);
    fn clear_texture(&mut self, texture: TextureHandle, value: ClearValue);
    /// Copies mip 0 of `src` into `dst`; both have the same size and format.
    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle);
    fn free_texture(&mut self, texture: TextureHandle);

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle>;
    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]);
    fn free_buffer(&mut self, buffer: BufferHandle);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle>;
    fn free_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Records `pass` against `framebuffer`.
    fn submit_pass(&mut self, framebuffer: FramebufferHandle, pass: &RenderPass);
}
