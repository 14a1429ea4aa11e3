//! Recorded Render Passes
//!
//! A [`RenderPass`] is a flat command list plus an ordered list of
//! [`SubPass`]es. Pass orchestrators record into it during `sync` and the
//! backend replays it during `draw`:
//!
//! ```text
//! RenderPass "Opaque.Gbuffer"
//!   ├─ header commands   (state, shared bindings)
//!   ├─ SubPass "Mesh.Material"      (shader + draws)
//!   ├─ SubPass "Mesh.Texture"
//!   └─ SubPass "Mesh.Texture.wood"  (per-image bindings + draws)
//! ```
//!
//! Commands are replayed in order: header first, then every sub-pass in
//! creation order. Sub-passes inherit the header state and bindings.

use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::renderer::backend::{BufferHandle, ClearValue, SamplerState, ShaderHandle, TextureHandle};
use crate::renderer::graph::slot::Binding;

bitflags::bitflags! {
    /// Fixed-function state of a pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawState: u32 {
        const WRITE_COLOR        = 1 << 0;
        const WRITE_DEPTH        = 1 << 1;
        const WRITE_STENCIL      = 1 << 2;
        const DEPTH_LESS_EQUAL   = 1 << 3;
        const DEPTH_ALWAYS       = 1 << 4;
        const STENCIL_ALWAYS     = 1 << 5;
        const STENCIL_EQUAL      = 1 << 6;
        const STENCIL_NEQUAL     = 1 << 7;
        const CULL_BACK          = 1 << 8;
        const CLIP_PLANES        = 1 << 9;
        const BLEND_ALPHA        = 1 << 10;
        const BLEND_ALPHA_PREMUL = 1 << 11;
        /// Weighted blended order-independent transparency.
        const BLEND_OIT          = 1 << 12;
        const BLEND_ADD_FULL     = 1 << 13;
    }
}

/// Opaque index of a drawable object inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceHandle(pub u32);

/// Host geometry batch (a ready-to-draw vertex/index set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchHandle(pub u32);

/// One geometry draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub batch: BatchHandle,
    pub resource: ResourceHandle,
    /// Index into the frame's material storage buffer.
    pub material_index: u32,
}

/// Push-constant payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushConstant {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// 3x3 filter weights, row-major.
    Weights3x3([f32; 9]),
}

/// A recorded command.
#[derive(Debug, Clone)]
pub enum PassCommand {
    State(DrawState),
    Stencil {
        write_mask: u8,
        reference: u8,
        compare_mask: u8,
    },
    /// Clears each color attachment (in slot order) and/or the depth target.
    Clear(SmallVec<[ClearValue; 2]>),
    Shader(ShaderHandle),
    Texture {
        slot: &'static str,
        texture: Binding<TextureHandle>,
        sampler: SamplerState,
    },
    UniformBuffer {
        slot: &'static str,
        buffer: Binding<BufferHandle>,
    },
    StorageBuffer {
        slot: &'static str,
        buffer: Binding<BufferHandle>,
    },
    Push {
        name: &'static str,
        value: PushConstant,
    },
    Draw(DrawCall),
    /// Procedural full-screen triangle.
    DrawFullscreen,
}

impl PassCommand {
    #[inline]
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw(_) | Self::DrawFullscreen)
    }
}

/// Shared recording API of [`RenderPass`] and [`SubPass`].
pub trait PassRecorder {
    fn commands_mut(&mut self) -> &mut Vec<PassCommand>;

    fn state_set(&mut self, state: DrawState) {
        self.commands_mut().push(PassCommand::State(state));
    }

    fn state_stencil(&mut self, write_mask: u8, reference: u8, compare_mask: u8) {
        self.commands_mut().push(PassCommand::Stencil {
            write_mask,
            reference,
            compare_mask,
        });
    }

    fn clear(&mut self, values: &[ClearValue]) {
        self.commands_mut()
            .push(PassCommand::Clear(values.iter().copied().collect()));
    }

    fn shader_set(&mut self, shader: ShaderHandle) {
        self.commands_mut().push(PassCommand::Shader(shader));
    }

    fn bind_texture(
        &mut self,
        slot: &'static str,
        texture: impl Into<Binding<TextureHandle>>,
        sampler: SamplerState,
    ) {
        self.commands_mut().push(PassCommand::Texture {
            slot,
            texture: texture.into(),
            sampler,
        });
    }

    fn bind_ubo(&mut self, slot: &'static str, buffer: impl Into<Binding<BufferHandle>>) {
        self.commands_mut().push(PassCommand::UniformBuffer {
            slot,
            buffer: buffer.into(),
        });
    }

    fn bind_ssbo(&mut self, slot: &'static str, buffer: impl Into<Binding<BufferHandle>>) {
        self.commands_mut().push(PassCommand::StorageBuffer {
            slot,
            buffer: buffer.into(),
        });
    }

    fn push_constant(&mut self, name: &'static str, value: PushConstant) {
        self.commands_mut().push(PassCommand::Push { name, value });
    }

    fn draw(&mut self, call: DrawCall) {
        self.commands_mut().push(PassCommand::Draw(call));
    }

    fn draw_fullscreen(&mut self) {
        self.commands_mut().push(PassCommand::DrawFullscreen);
    }
}

/// Index of a sub-pass inside its parent [`RenderPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubPassId(pub(crate) u32);

/// A named command group nested in a [`RenderPass`].
#[derive(Debug, Clone)]
pub struct SubPass {
    name: String,
    commands: Vec<PassCommand>,
}

impl SubPass {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }
}

impl PassRecorder for SubPass {
    fn commands_mut(&mut self) -> &mut Vec<PassCommand> {
        &mut self.commands
    }
}

/// A recorded pass: header commands followed by sub-passes.
#[derive(Debug, Clone)]
pub struct RenderPass {
    name: &'static str,
    commands: Vec<PassCommand>,
    subpasses: Vec<SubPass>,
}

impl RenderPass {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            commands: Vec::new(),
            subpasses: Vec::new(),
        }
    }

    /// Drops everything recorded for the previous frame.
    pub fn init(&mut self) {
        self.commands.clear();
        self.subpasses.clear();
    }

    /// Appends a new sub-pass and returns its id.
    pub fn sub(&mut self, name: impl Into<String>) -> SubPassId {
        let id = SubPassId(self.subpasses.len() as u32);
        self.subpasses.push(SubPass {
            name: name.into(),
            commands: Vec::new(),
        });
        id
    }

    #[inline]
    #[must_use]
    pub fn subpass(&self, id: SubPassId) -> &SubPass {
        &self.subpasses[id.0 as usize]
    }

    #[inline]
    pub fn subpass_mut(&mut self, id: SubPassId) -> &mut SubPass {
        &mut self.subpasses[id.0 as usize]
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn subpasses(&self) -> &[SubPass] {
        &self.subpasses
    }

    /// Header commands followed by every sub-pass command, in replay order.
    pub fn iter_commands(&self) -> impl Iterator<Item = &PassCommand> {
        self.commands
            .iter()
            .chain(self.subpasses.iter().flat_map(|s| s.commands.iter()))
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.iter_commands().filter(|c| c.is_draw()).count()
    }
}

impl PassRecorder for RenderPass {
    fn commands_mut(&mut self) -> &mut Vec<PassCommand> {
        &mut self.commands
    }
}
