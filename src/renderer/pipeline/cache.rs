//! Shader variant cache
//!
//! Maps every [`ShaderVariantKey`] to at most one compiled backend shader.
//! Entries are created on the first miss by synchronously compiling the
//! assembled source and are never evicted; the cache only shrinks in
//! [`ShaderCache::release_all`], which frees every handle exactly once.
//!
//! A compilation failure is returned as-is. Nothing is cached for the key,
//! so the next request retries the compilation.

use rustc_hash::FxHashMap;

use super::shader_gen::assemble;
use super::variant_key::{
    ColorType, GeometryType, PipelineType, PrepassKey, ResolveKey, ShaderVariantKey, ShadingType,
    UtilityShader,
};
use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, ShaderHandle};

#[derive(Debug, Default)]
pub struct ShaderCache {
    shaders: FxHashMap<ShaderVariantKey, ShaderHandle>,
}

impl ShaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shader for `key`, compiling it on first request.
    pub fn get(
        &mut self,
        backend: &mut dyn GpuBackend,
        key: impl Into<ShaderVariantKey>,
    ) -> Result<ShaderHandle> {
        let key = key.into();
        if let Some(handle) = self.shaders.get(&key) {
            return Ok(*handle);
        }

        let source = assemble(key);
        let handle = backend.compile_shader(&source)?;
        log::debug!("Compiled shader variant '{}' ({:032x})", source.name, source.hash);
        self.shaders.insert(key, handle);
        Ok(handle)
    }

    pub fn prepass_shader_get(
        &mut self,
        backend: &mut dyn GpuBackend,
        pipeline: PipelineType,
        geometry: GeometryType,
        color: ColorType,
        shading: ShadingType,
        clip: bool,
    ) -> Result<ShaderHandle> {
        self.get(
            backend,
            PrepassKey {
                pipeline,
                geometry,
                color,
                shading,
                clip,
            },
        )
    }

    pub fn resolve_shader_get(
        &mut self,
        backend: &mut dyn GpuBackend,
        pipeline: PipelineType,
        shading: ShadingType,
        cavity: bool,
        curvature: bool,
    ) -> Result<ShaderHandle> {
        self.get(
            backend,
            ResolveKey {
                pipeline,
                shading,
                cavity,
                curvature,
            },
        )
    }

    #[inline]
    pub fn utility_shader_get(
        &mut self,
        backend: &mut dyn GpuBackend,
        shader: UtilityShader,
    ) -> Result<ShaderHandle> {
        self.get(backend, shader)
    }

    #[must_use]
    pub fn contains(&self, key: impl Into<ShaderVariantKey>) -> bool {
        self.shaders.contains_key(&key.into())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Frees every compiled shader. The cache is empty afterwards.
    pub fn release_all(&mut self, backend: &mut dyn GpuBackend) {
        for (_, handle) in self.shaders.drain() {
            backend.free_shader(handle);
        }
    }
}
