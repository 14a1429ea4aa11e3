//! Cavity and curvature
//!
//! Screen-space cavity is evaluated inside the opaque resolve shader. This
//! module owns its inputs: a disc kernel of up to [`MAX_SAMPLES`] taps and a
//! tileable jitter texture.
//!
//! The kernel is split into windows of `cavity_samples` taps. Each TAA
//! sample evaluates the next window, so a converged image has seen
//! `aa_samples * cavity_samples` taps in total without any single frame
//! paying for all of them.

use glam::{UVec2, Vec4};
use half::f16;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::errors::Result;
use crate::renderer::backend::{GpuBackend, SamplerState, TextureDesc};
use crate::renderer::graph::{PassRecorder, PersistentTexture, RenderPass, TextureSlot, UniformBuffer};
use crate::renderer::resources::WorldData;
use crate::renderer::state::SceneState;
use crate::utils::sampling::{halton, hash_to_unit_float};

pub const MAX_SAMPLES: usize = 512;
pub const JITTER_TEXTURE_SIZE: u32 = 64;

pub type CavitySamples = [Vec4; MAX_SAMPLES];

#[derive(Debug)]
pub struct CavityEffect {
    sample: u32,
    /// `(iteration_samples, total_samples)` the kernel was last built for.
    kernel: Option<(u32, u32)>,
    cavity_enabled: bool,
    curvature_enabled: bool,
    pub samples_buf: UniformBuffer<CavitySamples>,
    jitter_tx: PersistentTexture,
}

impl Default for CavityEffect {
    fn default() -> Self {
        Self {
            sample: 0,
            kernel: None,
            cavity_enabled: false,
            curvature_enabled: false,
            samples_buf: UniformBuffer::new("cavity_samples", [Vec4::ZERO; MAX_SAMPLES]),
            jitter_tx: PersistentTexture::new(),
        }
    }
}

impl CavityEffect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the cavity fields of `world` for TAA sample `taa_sample` and
    /// (re)builds the kernel when needed.
    pub fn init(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        taa_sample: u32,
        world: &mut WorldData,
    ) -> Result<()> {
        self.cavity_enabled = scene_state.draw_cavity;
        self.curvature_enabled = scene_state.draw_curvature;

        let iteration_samples = scene_state.display.cavity_samples.clamp(1, MAX_SAMPLES as u32);
        let total_samples =
            (scene_state.aa_samples.max(1) * iteration_samples).min(MAX_SAMPLES as u32);
        let max_iterations = (total_samples / iteration_samples).max(1);
        self.sample = taa_sample % max_iterations;

        world.cavity_sample_start = iteration_samples * self.sample;
        world.cavity_sample_end = iteration_samples * (self.sample + 1);
        world.cavity_sample_count_inv =
            1.0 / (world.cavity_sample_end - world.cavity_sample_start) as f32;
        world.cavity_jitter_scale = 1.0 / JITTER_TEXTURE_SIZE as f32;
        world.cavity_valley_factor = scene_state.shading.cavity_valley_factor;
        world.cavity_ridge_factor = scene_state.shading.cavity_ridge_factor;
        world.cavity_attenuation = scene_state.display.cavity_attenuation;
        world.cavity_distance = scene_state.display.cavity_distance;
        world.curvature_ridge =
            0.5 / (scene_state.shading.curvature_ridge_factor.powi(2)).max(1e-4);
        world.curvature_valley =
            0.7 / (scene_state.shading.curvature_valley_factor.powi(2)).max(1e-4);

        if self.cavity_enabled || self.curvature_enabled {
            self.setup_resources(backend, iteration_samples, total_samples)?;
        }
        Ok(())
    }

    fn setup_resources(
        &mut self,
        backend: &mut dyn GpuBackend,
        iteration_samples: u32,
        total_samples: u32,
    ) -> Result<()> {
        if self.kernel != Some((iteration_samples, total_samples)) {
            fill_samples(&mut self.samples_buf.data, iteration_samples, total_samples);
            self.samples_buf.push_update(backend)?;
            self.kernel = Some((iteration_samples, total_samples));
        }
        self.ensure_jitter(backend)
    }

    /// Allocates and fills the jitter texture once. Also used by depth of field.
    pub fn ensure_jitter(&mut self, backend: &mut dyn GpuBackend) -> Result<()> {
        let desc = TextureDesc::sampled(
            "cavity_jitter_tx",
            UVec2::splat(JITTER_TEXTURE_SIZE),
            wgpu::TextureFormat::Rgba16Float,
        );
        if self.jitter_tx.ensure_2d(backend, &desc)? {
            let texels = jitter_texels();
            if let Some(handle) = self.jitter_tx.handle() {
                backend.upload_texture(handle, bytemuck::cast_slice(&texels));
            }
        }
        Ok(())
    }

    /// Binds the kernel and jitter (cavity) and the object ids (curvature).
    pub fn setup_resolve_pass(&self, pass: &mut RenderPass, object_id_tx: &TextureSlot) {
        if self.cavity_enabled {
            pass.bind_ubo("cavity_samples", self.samples_buf.slot());
            pass.bind_texture("jitter_tx", self.jitter_tx.slot(), SamplerState::NEAREST_REPEAT);
        }
        if self.curvature_enabled {
            pass.bind_texture("object_id_tx", object_id_tx, SamplerState::DEFAULT);
        }
    }

    #[inline]
    #[must_use]
    pub fn jitter_slot(&self) -> &TextureSlot {
        self.jitter_tx.slot()
    }

    /// Kernel window index used this frame.
    #[inline]
    #[must_use]
    pub fn sample(&self) -> u32 {
        self.sample
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.samples_buf.free(backend);
        self.jitter_tx.free(backend);
        self.kernel = None;
    }
}

/// Hammersley disc, rotated a little per window so windows do not overlap.
fn fill_samples(samples: &mut CavitySamples, iteration_samples: u32, total_samples: u32) {
    let iteration_samples_inv = 1.0 / iteration_samples as f32;
    for i in 0..total_samples {
        let it_add = (i / iteration_samples) as f32 * 0.499;
        let r = ((i as f32 + 0.5 + it_add) * iteration_samples_inv).fract();
        let phi = halton(i, 2) * std::f32::consts::TAU + it_add;
        samples[i as usize] = Vec4::new(phi.cos(), phi.sin(), r, 0.0);
    }
}

/// Random rotation (xy) and two scalar offsets (zw) per texel.
fn jitter_texels() -> Vec<[u16; 4]> {
    let count = (JITTER_TEXTURE_SIZE * JITTER_TEXTURE_SIZE) as u64;
    (0..count)
        .map(|i| {
            let bytes = i.to_le_bytes();
            let phi = hash_to_unit_float(xxh3_64_with_seed(&bytes, 0)) * std::f32::consts::TAU;
            let z = hash_to_unit_float(xxh3_64_with_seed(&bytes, 1));
            let w = hash_to_unit_float(xxh3_64_with_seed(&bytes, 2));
            [phi.cos(), phi.sin(), z, w].map(|v| f16::from_f32(v).to_bits())
        })
        .collect()
}
