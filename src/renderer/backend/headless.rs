//! Headless backend
//!
//! Records every backend call in memory instead of talking to a device.
//! Resources live in `slotmap`s so stale handles are detected; each submitted
//! pass is flattened into a [`Submission`] with its bindings resolved at
//! submission time.

use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use super::{
    BufferDesc, BufferHandle, ClearValue, FramebufferDesc, FramebufferHandle, GpuBackend,
    ShaderHandle, TextureDesc, TextureHandle,
};
use crate::errors::{Result, WorkbenchError};
use crate::renderer::graph::pass::{DrawState, PassCommand, RenderPass};
use crate::renderer::pipeline::shader_gen::ShaderSource;

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub shaders_compiled: usize,
    pub shaders_freed: usize,
    pub textures_allocated: usize,
    pub textures_freed: usize,
    pub texture_uploads: usize,
    pub texture_clears: usize,
    pub texture_copies: usize,
    pub buffers_created: usize,
    pub buffers_freed: usize,
    pub buffer_writes: usize,
    pub framebuffers_created: usize,
    pub framebuffers_freed: usize,
    pub passes_submitted: usize,
    /// Bindings (or framebuffers, shaders) that did not resolve to a live
    /// resource at submission time.
    pub unresolved_bindings: usize,
    /// `free_*` calls on handles that were not live.
    pub invalid_frees: usize,
}

/// One submitted pass, flattened at submission time.
#[derive(Debug, Clone)]
pub struct Submission {
    pub pass: &'static str,
    pub framebuffer: FramebufferHandle,
    pub subpasses: Vec<String>,
    /// Names of the shaders bound, in command order.
    pub shaders: Vec<String>,
    /// Resolved texture bindings as `(slot, handle)`.
    pub textures: Vec<(&'static str, TextureHandle)>,
    pub states: Vec<DrawState>,
    pub draw_count: usize,
}

impl Submission {
    #[must_use]
    pub fn binds_texture(&self, texture: TextureHandle) -> bool {
        self.textures.iter().any(|(_, t)| *t == texture)
    }
}

#[derive(Debug)]
struct BufferRecord {
    desc: BufferDesc,
    data: Vec<u8>,
}

/// In-memory [`GpuBackend`].
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    shaders: SlotMap<ShaderHandle, ShaderSource>,
    textures: SlotMap<TextureHandle, TextureDesc>,
    buffers: SlotMap<BufferHandle, BufferRecord>,
    framebuffers: SlotMap<FramebufferHandle, FramebufferDesc>,
    submissions: Vec<Submission>,
    stats: BackendStats,
    failing_shaders: FxHashSet<String>,
    fail_allocations: bool,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Failure injection ──────────────────────────────────────────────────

    /// Makes every later compilation of the shader named `name` fail.
    pub fn fail_shader(&mut self, name: impl Into<String>) {
        self.failing_shaders.insert(name.into());
    }

    /// Makes texture, buffer and framebuffer allocations fail (or succeed again).
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    #[inline]
    #[must_use]
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn clear_submissions(&mut self) {
        self.submissions.clear();
    }

    /// Submissions of the pass named `name`.
    pub fn submissions_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Submission> {
        self.submissions.iter().filter(move |s| s.pass == name)
    }

    #[must_use]
    pub fn shader_name(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(shader).map(|s| s.name.as_str())
    }

    #[must_use]
    pub fn shader_source(&self, shader: ShaderHandle) -> Option<&ShaderSource> {
        self.shaders.get(shader)
    }

    #[must_use]
    pub fn texture_desc(&self, texture: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(texture)
    }

    #[must_use]
    pub fn buffer_size(&self, buffer: BufferHandle) -> Option<u64> {
        self.buffers.get(buffer).map(|b| b.desc.size)
    }

    /// Last bytes written to `buffer`.
    #[must_use]
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|b| b.data.as_slice())
    }

    #[must_use]
    pub fn live_shader_count(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn check_allocation(&self, what: &str, label: &str) -> Result<()> {
        if self.fail_allocations {
            return Err(WorkbenchError::ResourceAllocation(format!(
                "{what} '{label}' (injected failure)"
            )));
        }
        Ok(())
    }
}

impl GpuBackend for HeadlessBackend {
    fn compile_shader(&mut self, source: &ShaderSource) -> Result<ShaderHandle> {
        if self.failing_shaders.contains(&source.name) {
            return Err(WorkbenchError::ShaderCompile {
                shader: source.name.clone(),
                reason: "injected failure".to_string(),
            });
        }
        self.stats.shaders_compiled += 1;
        Ok(self.shaders.insert(source.clone()))
    }

    fn free_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(shader).is_some() {
            self.stats.shaders_freed += 1;
        } else {
            self.stats.invalid_frees += 1;
        }
    }

    fn allocate_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        self.check_allocation("texture", desc.label)?;
        if desc.width == 0 || desc.height == 0 {
            return Err(WorkbenchError::ResourceAllocation(format!(
                "texture '{}' has zero extent",
                desc.label
            )));
        }
        self.stats.textures_allocated += 1;
        Ok(self.textures.insert(desc.clone()))
    }

    fn upload_texture(&mut self, texture: TextureHandle, _data: &[u8]) {
        if self.textures.contains_key(texture) {
            self.stats.texture_uploads += 1;
        } else {
            self.stats.unresolved_bindings += 1;
        }
    }

    fn clear_texture(&mut self, texture: TextureHandle, _value: ClearValue) {
        if self.textures.contains_key(texture) {
            self.stats.texture_clears += 1;
        } else {
            self.stats.unresolved_bindings += 1;
        }
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle) {
        if self.textures.contains_key(src) && self.textures.contains_key(dst) {
            self.stats.texture_copies += 1;
        } else {
            self.stats.unresolved_bindings += 1;
        }
    }

    fn free_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(texture).is_some() {
            self.stats.textures_freed += 1;
        } else {
            self.stats.invalid_frees += 1;
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        self.check_allocation("buffer", desc.label)?;
        self.stats.buffers_created += 1;
        Ok(self.buffers.insert(BufferRecord {
            desc: desc.clone(),
            data: Vec::new(),
        }))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[u8]) {
        match self.buffers.get_mut(buffer) {
            Some(record) if data.len() as u64 <= record.desc.size => {
                record.data.clear();
                record.data.extend_from_slice(data);
                self.stats.buffer_writes += 1;
            }
            _ => self.stats.unresolved_bindings += 1,
        }
    }

    fn free_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(buffer).is_some() {
            self.stats.buffers_freed += 1;
        } else {
            self.stats.invalid_frees += 1;
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        self.check_allocation("framebuffer", desc.label)?;
        for texture in desc.depth.iter().chain(desc.colors.iter()) {
            let Some(tex) = self.textures.get(*texture) else {
                return Err(WorkbenchError::Configuration(format!(
                    "framebuffer '{}' references dead texture {texture:?}",
                    desc.label
                )));
            };
            if desc.mip_level >= tex.mip_level_count {
                return Err(WorkbenchError::Configuration(format!(
                    "framebuffer '{}' attaches mip {} of '{}' which has {}",
                    desc.label, desc.mip_level, tex.label, tex.mip_level_count
                )));
            }
        }
        self.stats.framebuffers_created += 1;
        Ok(self.framebuffers.insert(desc.clone()))
    }

    fn free_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffers.remove(framebuffer).is_some() {
            self.stats.framebuffers_freed += 1;
        } else {
            self.stats.invalid_frees += 1;
        }
    }

    fn submit_pass(&mut self, framebuffer: FramebufferHandle, pass: &RenderPass) {
        self.stats.passes_submitted += 1;
        if !self.framebuffers.contains_key(framebuffer) {
            self.stats.unresolved_bindings += 1;
        }

        let mut submission = Submission {
            pass: pass.name(),
            framebuffer,
            subpasses: pass.subpasses().iter().map(|s| s.name().to_string()).collect(),
            shaders: Vec::new(),
            textures: Vec::new(),
            states: Vec::new(),
            draw_count: 0,
        };

        for command in pass.iter_commands() {
            match command {
                PassCommand::State(state) => submission.states.push(*state),
                PassCommand::Shader(shader) => match self.shaders.get(*shader) {
                    Some(source) => submission.shaders.push(source.name.clone()),
                    None => self.stats.unresolved_bindings += 1,
                },
                PassCommand::Texture { slot, texture, .. } => match texture.resolve() {
                    Some(handle) if self.textures.contains_key(handle) => {
                        submission.textures.push((*slot, handle));
                    }
                    _ => self.stats.unresolved_bindings += 1,
                },
                PassCommand::UniformBuffer { buffer, .. }
                | PassCommand::StorageBuffer { buffer, .. } => match buffer.resolve() {
                    Some(handle) if self.buffers.contains_key(handle) => {}
                    _ => self.stats.unresolved_bindings += 1,
                },
                PassCommand::Draw(_) | PassCommand::DrawFullscreen => submission.draw_count += 1,
                PassCommand::Stencil { .. } | PassCommand::Clear(_) | PassCommand::Push { .. } => {}
            }
        }

        self.submissions.push(submission);
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;

    #[test]
    fn test_double_free_is_counted() {
        let mut backend = HeadlessBackend::new();
        let desc = TextureDesc::target("t", UVec2::ONE, wgpu::TextureFormat::R8Unorm);
        let t = backend.allocate_texture(&desc).unwrap();
        backend.free_texture(t);
        backend.free_texture(t);
        assert_eq!(backend.stats().textures_freed, 1);
        assert_eq!(backend.stats().invalid_frees, 1);
    }

    #[test]
    fn test_injected_allocation_failure() {
        let mut backend = HeadlessBackend::new();
        backend.set_fail_allocations(true);
        let desc = TextureDesc::target("t", UVec2::ONE, wgpu::TextureFormat::R8Unorm);
        assert!(matches!(
            backend.allocate_texture(&desc),
            Err(WorkbenchError::ResourceAllocation(_))
        ));
    }
}
