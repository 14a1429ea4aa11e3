//! Anti-aliasing
//!
//! Temporal accumulation followed by SMAA.
//!
//! Every redraw renders the scene with the projection shifted by a sub-pixel
//! offset taken from a per-budget jitter table, and adds it to a history
//! texture with a 3x3 Blackman-Harris reconstruction filter. After
//! `sample_len` samples the image is converged and the scene is no longer
//! rendered; the history is simply resolved again.
//!
//! ```text
//!            sample < sample_len           sample == sample_len
//!  reset ──► accumulating ───────────────► converged
//!    ▲            │  draw(): sample += 1        │
//!    └────────────┴─────────────────────────────┘  view / settings / size change
//! ```
//!
//! SMAA (edge detection → blend weights → resolve) runs on the history and
//! fades out over the first samples, where TAA alone is not yet enough.

use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};

use crate::errors::{Result, WorkbenchError};
use crate::renderer::backend::{ClearValue, GpuBackend, SamplerState, TextureDesc};
use crate::renderer::graph::{
    DrawState, Framebuffer, PassRecorder, PersistentTexture, PushConstant, RenderPass,
    TextureFromPool,
};
use crate::renderer::pipeline::UtilityShader;
use crate::renderer::resources::{DEPTH_FORMAT, SceneResources, ViewData};
use crate::renderer::state::SceneState;
use crate::scene::ViewportTargets;
use crate::utils::sampling::halton_2_3;

pub const SMAA_AREA_SIZE: UVec2 = UVec2::new(160, 560);
pub const SMAA_SEARCH_SIZE: UVec2 = UVec2::new(64, 16);
/// Reconstruction filter width, in pixels.
const FILTER_WIDTH: f32 = 2.0;
/// Samples over which SMAA fades out.
const SMAA_FADE_SAMPLES: f32 = 4.0;

#[derive(Debug)]
pub struct AntiAliasingPass {
    sample: u32,
    sample_len: u32,
    is_image_render: bool,

    jitter: Vec<Vec2>,
    weights: [f32; 9],
    weights_sum: f32,
    weight_accum: f32,
    history_valid: bool,
    smaa_mix_factor: f32,

    taa_accumulation_tx: PersistentTexture,
    sample0_depth_tx: PersistentTexture,
    smaa_area_tx: PersistentTexture,
    smaa_search_tx: PersistentTexture,
    smaa_edge_tx: TextureFromPool,
    smaa_weight_tx: TextureFromPool,

    taa_accumulation_ps: RenderPass,
    smaa_edge_detect_ps: RenderPass,
    smaa_aa_weight_ps: RenderPass,
    smaa_resolve_ps: RenderPass,

    taa_accumulation_fb: Framebuffer,
    smaa_edge_fb: Framebuffer,
    smaa_weight_fb: Framebuffer,
    smaa_resolve_fb: Framebuffer,
}

impl Default for AntiAliasingPass {
    fn default() -> Self {
        Self {
            sample: 0,
            sample_len: 0,
            is_image_render: false,
            jitter: Vec::new(),
            weights: [0.0; 9],
            weights_sum: 0.0,
            weight_accum: 0.0,
            history_valid: false,
            smaa_mix_factor: 1.0,
            taa_accumulation_tx: PersistentTexture::new(),
            sample0_depth_tx: PersistentTexture::new(),
            smaa_area_tx: PersistentTexture::new(),
            smaa_search_tx: PersistentTexture::new(),
            smaa_edge_tx: TextureFromPool::new("wb_smaa_edge_tx"),
            smaa_weight_tx: TextureFromPool::new("wb_smaa_weight_tx"),
            taa_accumulation_ps: RenderPass::new("AA.TaaAccumulation"),
            smaa_edge_detect_ps: RenderPass::new("AA.SmaaEdgeDetect"),
            smaa_aa_weight_ps: RenderPass::new("AA.SmaaBlendWeights"),
            smaa_resolve_ps: RenderPass::new("AA.SmaaResolve"),
            taa_accumulation_fb: Framebuffer::new("taa_accumulation_fb"),
            smaa_edge_fb: Framebuffer::new("smaa_edge_fb"),
            smaa_weight_fb: Framebuffer::new("smaa_weight_fb"),
            smaa_resolve_fb: Framebuffer::new("smaa_resolve_fb"),
        }
    }
}

impl AntiAliasingPass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the AA budget of the frame and restarts accumulation on reset.
    pub fn init(&mut self, scene_state: &SceneState) {
        self.is_image_render = scene_state.is_image_render;
        if self.sample_len != scene_state.aa_samples {
            self.sample_len = scene_state.aa_samples;
            self.jitter = jitter_table(self.sample_len);
            self.reset();
        }
        if scene_state.reset_taa {
            if scene_state.resolution_changed {
                log::info!(
                    "TAA reset: resolution changed to {}x{}",
                    scene_state.resolution.x,
                    scene_state.resolution.y
                );
            }
            self.reset();
        }
    }

    /// Restarts accumulation from sample 0 and drops the history.
    pub fn reset(&mut self) {
        self.sample = 0;
        self.weight_accum = 0.0;
        self.history_valid = false;
    }

    /// Jitters `view` for the current sample.
    ///
    /// Returns whether the scene must be rendered this frame: `true` while
    /// accumulating (and always when AA is off), `false` once converged.
    pub fn setup_view(&mut self, view: &mut ViewData, resolution: UVec2) -> bool {
        if self.sample_len == 0 {
            return true;
        }
        if self.is_converged() {
            return false;
        }

        let offset = self.jitter[self.sample as usize];
        let (weights, sum) = taa_weights(offset);
        self.weights = weights;
        self.weights_sum = sum;

        let shift = offset / resolution.max(UVec2::ONE).as_vec2();
        view.projection = Mat4::from_translation(Vec3::new(shift.x, shift.y, 0.0)) * view.projection;
        view.view_projection = view.projection * view.view;
        true
    }

    /// Records the accumulation and SMAA passes. Must follow
    /// [`setup_view`](Self::setup_view) in the same frame.
    pub fn sync(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
    ) -> Result<()> {
        if !self.is_enabled() {
            self.taa_accumulation_tx.free(backend);
            self.sample0_depth_tx.free(backend);
            return Ok(());
        }

        let resolution = scene_state.resolution;
        let fresh = self.taa_accumulation_tx.ensure_2d(
            backend,
            &TextureDesc::target("wb_taa_accumulation_tx", resolution, wgpu::TextureFormat::Rgba16Float),
        )?;
        if fresh && self.history_valid {
            log::info!("TAA history reallocated, restarting accumulation");
            self.reset();
        }
        self.sample0_depth_tx.ensure_2d(
            backend,
            &TextureDesc::target("wb_sample0_depth_tx", resolution, DEPTH_FORMAT),
        )?;
        self.ensure_smaa_tables(backend)?;

        let accumulated_weight = if self.is_converged() {
            self.weight_accum
        } else if self.sample == 0 {
            self.weights_sum
        } else {
            self.weight_accum + self.weights_sum
        };
        self.smaa_mix_factor = smaa_mix_factor(self.sample);

        let size = resolution.as_vec2();
        let metrics = Vec4::new(1.0 / size.x, 1.0 / size.y, size.x, size.y);
        let shaders = &mut resources.shader_cache;

        let ps = &mut self.taa_accumulation_ps;
        ps.init();
        ps.state_set(if self.sample > 0 {
            DrawState::WRITE_COLOR | DrawState::BLEND_ADD_FULL
        } else {
            DrawState::WRITE_COLOR
        });
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::TaaAccumulation)?);
        ps.bind_texture("colorBuffer", resources.color_tx.slot(), SamplerState::DEFAULT);
        ps.push_constant("samplesWeights", PushConstant::Weights3x3(self.weights));
        ps.draw_fullscreen();

        let ps = &mut self.smaa_edge_detect_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::SmaaEdgeDetect)?);
        ps.bind_texture("colorTex", self.taa_accumulation_tx.slot(), SamplerState::LINEAR);
        ps.push_constant("viewportMetrics", PushConstant::Vec4(metrics));
        ps.clear(&[ClearValue::Color(wgpu::Color::TRANSPARENT)]);
        ps.draw_fullscreen();

        let ps = &mut self.smaa_aa_weight_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::SmaaBlendWeights)?);
        ps.bind_texture("edgesTex", self.smaa_edge_tx.slot(), SamplerState::LINEAR);
        ps.bind_texture("areaTex", self.smaa_area_tx.slot(), SamplerState::LINEAR);
        ps.bind_texture("searchTex", self.smaa_search_tx.slot(), SamplerState::LINEAR);
        ps.push_constant("viewportMetrics", PushConstant::Vec4(metrics));
        ps.clear(&[ClearValue::Color(wgpu::Color::TRANSPARENT)]);
        ps.draw_fullscreen();

        let ps = &mut self.smaa_resolve_ps;
        ps.init();
        ps.state_set(DrawState::WRITE_COLOR);
        ps.shader_set(shaders.utility_shader_get(backend, UtilityShader::SmaaResolve)?);
        ps.bind_texture("blendTex", self.smaa_weight_tx.slot(), SamplerState::LINEAR);
        ps.bind_texture("colorTex", self.taa_accumulation_tx.slot(), SamplerState::LINEAR);
        ps.push_constant("viewportMetrics", PushConstant::Vec4(metrics));
        ps.push_constant("mixFactor", PushConstant::Float(self.smaa_mix_factor));
        ps.push_constant("taaAccumulatedWeight", PushConstant::Float(accumulated_weight));
        ps.draw_fullscreen();
        Ok(())
    }

    /// Accumulates the frame (while not converged) and resolves into the
    /// host targets.
    pub fn draw(
        &mut self,
        backend: &mut dyn GpuBackend,
        scene_state: &SceneState,
        resources: &mut SceneResources,
        targets: ViewportTargets,
    ) -> Result<()> {
        let color = super::acquired(&resources.color_tx, "color")?;
        let depth = super::acquired(&resources.depth_tx, "depth")?;

        if !self.is_enabled() {
            backend.copy_texture(color, targets.color);
            backend.copy_texture(depth, targets.depth);
            return Ok(());
        }

        let (Some(history), Some(sample0_depth)) =
            (self.taa_accumulation_tx.handle(), self.sample0_depth_tx.handle())
        else {
            return Err(WorkbenchError::Configuration(
                "anti-aliasing drawn before sync".to_string(),
            ));
        };

        let accumulating = !self.is_converged();
        let last_sample = self.sample + 1 >= self.sample_len;

        if accumulating {
            if self.sample == 0 {
                self.weight_accum = 0.0;
            }
            let fb = self.taa_accumulation_fb.ensure(backend, None, &[history])?;
            backend.submit_pass(fb, &self.taa_accumulation_ps);
            self.weight_accum += self.weights_sum;
            self.history_valid = true;
        }

        // Later samples are jittered; the host gets the depth of sample 0.
        if self.sample == 0 {
            backend.copy_texture(depth, sample0_depth);
            backend.copy_texture(depth, targets.depth);
        } else {
            backend.copy_texture(sample0_depth, targets.depth);
        }

        if !self.is_image_render || last_sample {
            let resolution = scene_state.resolution;
            let weight = self.smaa_weight_tx.acquire(
                &mut resources.pool,
                backend,
                &TextureDesc::target("", resolution, wgpu::TextureFormat::Rgba8Unorm),
            )?;
            if self.smaa_mix_factor > 0.0 {
                let edge = self.smaa_edge_tx.acquire(
                    &mut resources.pool,
                    backend,
                    &TextureDesc::target("", resolution, wgpu::TextureFormat::Rg8Unorm),
                )?;
                let fb = self.smaa_edge_fb.ensure(backend, None, &[edge])?;
                backend.submit_pass(fb, &self.smaa_edge_detect_ps);
                let fb = self.smaa_weight_fb.ensure(backend, None, &[weight])?;
                backend.submit_pass(fb, &self.smaa_aa_weight_ps);
            }
            let fb = self.smaa_resolve_fb.ensure(backend, None, &[targets.color])?;
            backend.submit_pass(fb, &self.smaa_resolve_ps);
            super::release_all(&mut resources.pool, &[&self.smaa_edge_tx, &self.smaa_weight_tx]);
        }

        if accumulating {
            self.sample += 1;
        }
        Ok(())
    }

    /// Replaces the SMAA area (`160x560` RG8) and search (`64x16` R8) lookup
    /// tables. Until called both tables are zero, which disables SMAA blending.
    pub fn set_smaa_lookup_tables(
        &mut self,
        backend: &mut dyn GpuBackend,
        area: &[u8],
        search: &[u8],
    ) -> Result<()> {
        let area_len = (SMAA_AREA_SIZE.x * SMAA_AREA_SIZE.y * 2) as usize;
        let search_len = (SMAA_SEARCH_SIZE.x * SMAA_SEARCH_SIZE.y) as usize;
        if area.len() != area_len || search.len() != search_len {
            return Err(WorkbenchError::Configuration(format!(
                "SMAA tables must be {area_len} and {search_len} bytes, got {} and {}",
                area.len(),
                search.len()
            )));
        }
        self.ensure_smaa_tables(backend)?;
        if let (Some(area_tx), Some(search_tx)) =
            (self.smaa_area_tx.handle(), self.smaa_search_tx.handle())
        {
            backend.upload_texture(area_tx, area);
            backend.upload_texture(search_tx, search);
        }
        Ok(())
    }

    fn ensure_smaa_tables(&mut self, backend: &mut dyn GpuBackend) -> Result<()> {
        let tables = [
            (
                &mut self.smaa_area_tx,
                TextureDesc::sampled("smaa_area_tx", SMAA_AREA_SIZE, wgpu::TextureFormat::Rg8Unorm),
            ),
            (
                &mut self.smaa_search_tx,
                TextureDesc::sampled("smaa_search_tx", SMAA_SEARCH_SIZE, wgpu::TextureFormat::R8Unorm),
            ),
        ];
        for (texture, desc) in tables {
            if texture.ensure_2d(backend, &desc)?
                && let Some(handle) = texture.handle()
            {
                backend.clear_texture(
                    handle,
                    ClearValue::Color(wgpu::Color::TRANSPARENT),
                );
            }
        }
        Ok(())
    }

    // ── State ──────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sample_len > 0
    }

    #[inline]
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.sample >= self.sample_len
    }

    #[inline]
    #[must_use]
    pub fn sample(&self) -> u32 {
        self.sample
    }

    #[inline]
    #[must_use]
    pub fn sample_len(&self) -> u32 {
        self.sample_len
    }

    #[inline]
    #[must_use]
    pub fn history_valid(&self) -> bool {
        self.history_valid
    }

    #[inline]
    #[must_use]
    pub fn weights_sum(&self) -> f32 {
        self.weights_sum
    }

    #[inline]
    #[must_use]
    pub fn weight_accum(&self) -> f32 {
        self.weight_accum
    }

    /// Filter weights of the current sample divided by their sum.
    #[must_use]
    pub fn normalized_weights(&self) -> [f32; 9] {
        if self.weights_sum <= 0.0 {
            return [0.0; 9];
        }
        self.weights.map(|w| w / self.weights_sum)
    }

    #[inline]
    #[must_use]
    pub fn smaa_mix_factor(&self) -> f32 {
        self.smaa_mix_factor
    }

    /// Sub-pixel offset of sample `sample` of the current budget.
    #[must_use]
    pub fn jitter_offset(&self, sample: u32) -> Option<Vec2> {
        self.jitter.get(sample as usize).copied()
    }

    pub fn free(&mut self, backend: &mut dyn GpuBackend) {
        self.taa_accumulation_tx.free(backend);
        self.sample0_depth_tx.free(backend);
        self.smaa_area_tx.free(backend);
        self.smaa_search_tx.free(backend);
        self.taa_accumulation_fb.free(backend);
        self.smaa_edge_fb.free(backend);
        self.smaa_weight_fb.free(backend);
        self.smaa_resolve_fb.free(backend);
        self.reset();
    }
}

/// SMAA contribution for `sample`: full on the first sample, gone after a few.
#[must_use]
pub fn smaa_mix_factor(sample: u32) -> f32 {
    1.0 - (sample as f32 / SMAA_FADE_SAMPLES).clamp(0.0, 1.0)
}

fn blackman_harris(x: f32, width: f32) -> f32 {
    if x > width * 0.5 {
        return 0.0;
    }
    let x = std::f32::consts::TAU * (x / width + 0.5).clamp(0.0, 1.0);
    0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos() - 0.01168 * (3.0 * x).cos()
}

/// 3x3 reconstruction weights around a pixel for a sample at `offset`,
/// and their sum.
fn taa_weights(offset: Vec2) -> ([f32; 9], f32) {
    let mut weights = [0.0; 9];
    let mut sum = 0.0;
    let mut i = 0;
    for x in -1..=1 {
        for y in -1..=1 {
            let r = (Vec2::new(x as f32, y as f32) - offset).length();
            let weight = blackman_harris(r, FILTER_WIDTH);
            weights[i] = weight;
            sum += weight;
            i += 1;
        }
    }
    (weights, sum)
}

/// Jitter offsets for a budget of `len` samples.
///
/// Halton (2, 3) points recentered on the point closest to the pixel center,
/// which becomes sample 0 (no jitter). Each following sample is the one
/// farthest from its predecessor, so early samples already spread over the
/// whole pixel.
#[must_use]
pub fn jitter_table(len: u32) -> Vec<Vec2> {
    let mut table: Vec<Vec2> = (0..len)
        .map(|i| halton_2_3(i + 1) - Vec2::splat(0.5))
        .collect();
    if table.is_empty() {
        return table;
    }

    let closest = table
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.length_squared().total_cmp(&b.length_squared()))
        .map_or(0, |(i, _)| i);
    let center = table[closest];
    for p in &mut table {
        *p = (*p - center) * 2.0;
    }
    table.swap(0, closest);

    for i in 0..table.len().saturating_sub(2) {
        let previous = table[i];
        let farthest = (i + 1..table.len())
            .max_by(|a, b| {
                table[*a]
                    .distance_squared(previous)
                    .total_cmp(&table[*b].distance_squared(previous))
            })
            .unwrap_or(i + 1);
        table.swap(i + 1, farthest);
    }
    table
}
