//! Engine Core Module
//!
//! [`WorkbenchEngine`] drives one viewport. It owns the backend, the shared
//! resources and every pass, and runs them in a fixed per-frame protocol:
//!
//! ```text
//! init(frame) ──► object_sync(obj) × N ──► draw() ──► FrameStatus
//!    │                   │                    │
//!    │ scene state,      │ classify, resolve  │ jitter view, upload buffers,
//!    │ resources,        │ material, route    │ acquire targets, submit passes,
//!    │ pass sync         │ into mesh passes   │ anti-alias into host targets
//! ```
//!
//! The host keeps calling the protocol while [`FrameStatus::needs_redraw`] is
//! set; each call adds one TAA sample until the image converges. Scene edits
//! are reported with [`WorkbenchEngine::view_update`] before the next `init`.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut engine = WorkbenchEngine::new(HeadlessBackend::new());
//! loop {
//!     engine.init(&frame)?;
//!     for object in &objects {
//!         engine.object_sync(object)?;
//!     }
//!     if !engine.draw()?.needs_redraw {
//!         break;
//!     }
//! }
//! ```

use crate::errors::{Result, WorkbenchError};
use crate::renderer::backend::{GpuBackend, SamplerState};
use crate::renderer::graph::{BatchHandle, DrawCall, ResourceHandle};
use crate::renderer::passes::{
    AntiAliasingPass, DofPass, MeshPass, OpaquePass, OutlinePass, TransparentDepthPass,
    TransparentPass,
};
use crate::renderer::resources::SceneResources;
use crate::renderer::state::{
    Material, MaterialImage, MaterialSubType, ObjectState, SceneState, get_material_image,
};
use crate::scene::{DrawableObject, FrameInput, ShadingColor, ViewportTargets};

/// Outcome of [`WorkbenchEngine::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStatus {
    /// Samples accumulated so far.
    pub sample: u32,
    pub sample_len: u32,
    /// Every sample of the budget has been accumulated.
    pub converged: bool,
    /// The host should schedule another redraw.
    pub needs_redraw: bool,
}

pub struct WorkbenchEngine<B: GpuBackend> {
    backend: B,
    scene_state: SceneState,
    resources: SceneResources,

    opaque_ps: OpaquePass,
    transparent_ps: TransparentPass,
    transparent_depth_ps: TransparentDepthPass,
    outline_ps: OutlinePass,
    dof_ps: DofPass,
    anti_aliasing_ps: AntiAliasingPass,

    /// Host targets of the frame in progress; `None` outside a frame.
    targets: Option<ViewportTargets>,
    next_resource: u32,
}

impl<B: GpuBackend> WorkbenchEngine<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            scene_state: SceneState::new(),
            resources: SceneResources::new(),
            opaque_ps: OpaquePass::new(),
            transparent_ps: TransparentPass::new(),
            transparent_depth_ps: TransparentDepthPass::new(),
            outline_ps: OutlinePass::new(),
            dof_ps: DofPass::new(),
            anti_aliasing_ps: AntiAliasingPass::new(),
            targets: None,
            next_resource: 0,
        }
    }

    /// Starts a frame: recomputes the scene state, refreshes shared
    /// resources and records every pass header.
    pub fn init(&mut self, frame: &FrameInput) -> Result<()> {
        let backend: &mut dyn GpuBackend = &mut self.backend;
        self.scene_state.init(frame);
        self.anti_aliasing_ps.init(&self.scene_state);
        let taa_sample = self.anti_aliasing_ps.sample();

        self.resources
            .init(backend, &self.scene_state, frame, taa_sample)?;
        self.dof_ps
            .init(backend, &self.scene_state, &mut self.resources, taa_sample)?;

        self.opaque_ps
            .sync(backend, &self.scene_state, &mut self.resources)?;
        self.transparent_ps
            .sync(backend, &self.scene_state, &mut self.resources)?;
        self.transparent_depth_ps
            .sync(backend, &self.scene_state, &mut self.resources)?;
        self.outline_ps
            .sync(backend, &self.scene_state, &mut self.resources)?;
        self.dof_ps
            .sync(backend, &self.scene_state, &mut self.resources)?;

        self.targets = Some(frame.targets);
        self.next_resource = 0;
        Ok(())
    }

    /// Tells the engine the scene contents changed (objects added, moved or
    /// edited). The next frame restarts temporal accumulation and rasterizes
    /// the scene again even when the previous image had converged.
    pub fn view_update(&mut self) {
        self.scene_state.tag_update();
    }

    /// Classifies `object` and routes its batches into the mesh passes.
    pub fn object_sync(&mut self, object: &DrawableObject) -> Result<()> {
        if self.targets.is_none() {
            return Err(WorkbenchError::Configuration(format!(
                "object '{}' synced outside of a frame",
                object.name
            )));
        }

        let state = ObjectState::new(&self.scene_state, object);
        let resource = ResourceHandle(self.next_resource);
        self.next_resource += 1;

        if state.use_per_material_batches {
            let batches = &object.batches.per_material;
            let slot_count = object.material_slot_count();
            if !batches.is_empty() && batches.len() < slot_count {
                log::warn!(
                    "Object '{}' has {slot_count} material slot(s) but {} batch(es)",
                    object.name,
                    batches.len()
                );
            }
            // Without per-slot geometry the whole mesh uses the first slot.
            let single = [object.batches.single];
            let batches = if batches.is_empty() { &single[..] } else { &batches[..] };
            for (slot, batch) in batches.iter().enumerate() {
                let material = match object.material(slot) {
                    Some(data) => Material::from_material(data),
                    None => {
                        log::warn!(
                            "Object '{}' slot {slot} has no material, using default",
                            object.name
                        );
                        Material::default()
                    }
                };
                let image = if state.color_type == ShadingColor::Texture {
                    get_material_image(object, slot)
                } else {
                    None
                };
                self.draw_mesh(object, resource, *batch, material, image.as_ref())?;
            }
            return Ok(());
        }

        let material = match state.material_subtype {
            MaterialSubType::Object => Material::from_object(object, false),
            MaterialSubType::Random => Material::from_object(object, true),
            MaterialSubType::Single => self.scene_state.material_override,
            MaterialSubType::Attribute => self.scene_state.material_attribute_color,
            MaterialSubType::Material => object
                .material(0)
                .map(Material::from_material)
                .unwrap_or_default(),
        };
        let image = state.image_paint_override.map(|image| MaterialImage {
            image,
            user: None,
            sampler: state.override_sampler_state,
        });
        self.draw_mesh(object, resource, object.batches.single, material, image.as_ref())
    }

    fn draw_mesh(
        &mut self,
        object: &DrawableObject,
        resource: ResourceHandle,
        batch: BatchHandle,
        material: Material,
        image: Option<&MaterialImage>,
    ) -> Result<()> {
        let call = DrawCall {
            batch,
            resource,
            material_index: self.resources.material_buf.append(material),
        };
        let in_front = object.is_in_front();
        let route = |pass: &mut MeshPass| -> Result<()> {
            let id = pass.sub_pass_get(
                object.geometry,
                image.map(|i| &i.image),
                image.map_or(SamplerState::DEFAULT, |i| i.sampler),
                image.and_then(|i| i.user.as_ref()),
            )?;
            pass.draw(id, call);
            Ok(())
        };

        if self.scene_state.xray_mode || material.is_transparent() {
            let (accumulation, depth) = if in_front {
                (
                    &mut self.transparent_ps.accumulation_in_front_ps,
                    &mut self.transparent_depth_ps.in_front_ps,
                )
            } else {
                (
                    &mut self.transparent_ps.accumulation_ps,
                    &mut self.transparent_depth_ps.main_ps,
                )
            };
            route(accumulation)?;
            if self.scene_state.draw_transparent_depth {
                route(depth)?;
            }
        } else if in_front {
            route(&mut self.opaque_ps.gbuffer_in_front_ps)?;
        } else {
            route(&mut self.opaque_ps.gbuffer_ps)?;
        }
        Ok(())
    }

    /// Renders the frame into the host targets and reports accumulation
    /// progress.
    pub fn draw(&mut self) -> Result<FrameStatus> {
        let Some(targets) = self.targets else {
            return Err(WorkbenchError::Configuration(
                "draw called outside of a frame".to_string(),
            ));
        };
        let result = self.draw_frame(targets);
        self.resources.end_frame();
        self.targets = None;
        result?;

        let aa = &self.anti_aliasing_ps;
        let converged = aa.is_converged();
        Ok(FrameStatus {
            sample: aa.sample(),
            sample_len: aa.sample_len(),
            converged,
            needs_redraw: !converged,
        })
    }

    fn draw_frame(&mut self, targets: ViewportTargets) -> Result<()> {
        let backend: &mut dyn GpuBackend = &mut self.backend;
        let scene_state = &self.scene_state;
        let resources = &mut self.resources;

        let render_scene = self
            .anti_aliasing_ps
            .setup_view(&mut resources.view_buf.data, scene_state.resolution);
        self.anti_aliasing_ps.sync(backend, scene_state, resources)?;
        resources.upload(backend)?;

        let needs_in_front_depth = !self.opaque_ps.gbuffer_in_front_ps.is_empty()
            || !self.transparent_ps.accumulation_in_front_ps.is_empty()
            || !self.transparent_depth_ps.in_front_ps.is_empty();
        resources.acquire_frame_textures(backend, scene_state, needs_in_front_depth)?;

        if render_scene {
            self.opaque_ps.draw(backend, scene_state, resources)?;
            self.transparent_ps.draw(backend, scene_state, resources)?;
            self.transparent_depth_ps.draw(backend, scene_state, resources)?;
            self.outline_ps.draw(backend, resources)?;
            self.dof_ps.draw(backend, scene_state, resources)?;
        }
        self.anti_aliasing_ps
            .draw(backend, scene_state, resources, targets)
    }

    /// Installs the SMAA area and search lookup tables.
    pub fn set_smaa_lookup_tables(&mut self, area: &[u8], search: &[u8]) -> Result<()> {
        self.anti_aliasing_ps
            .set_smaa_lookup_tables(&mut self.backend, area, search)
    }

    /// Frees every GPU object the engine owns. The engine stays usable; the
    /// next frame reallocates what it needs.
    pub fn release_resources(&mut self) {
        let backend: &mut dyn GpuBackend = &mut self.backend;
        self.opaque_ps.free(backend);
        self.transparent_ps.free(backend);
        self.transparent_depth_ps.free(backend);
        self.outline_ps.free(backend);
        self.dof_ps.free(backend);
        self.anti_aliasing_ps.free(backend);
        self.resources.release_all(backend);
        self.targets = None;
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn scene_state(&self) -> &SceneState {
        &self.scene_state
    }

    #[inline]
    pub fn resources(&self) -> &SceneResources {
        &self.resources
    }

    #[inline]
    pub fn opaque(&self) -> &OpaquePass {
        &self.opaque_ps
    }

    #[inline]
    pub fn transparent(&self) -> &TransparentPass {
        &self.transparent_ps
    }

    #[inline]
    pub fn transparent_depth(&self) -> &TransparentDepthPass {
        &self.transparent_depth_ps
    }

    #[inline]
    pub fn outline(&self) -> &OutlinePass {
        &self.outline_ps
    }

    #[inline]
    pub fn dof(&self) -> &DofPass {
        &self.dof_ps
    }

    #[inline]
    pub fn anti_aliasing(&self) -> &AntiAliasingPass {
        &self.anti_aliasing_ps
    }
}

impl<B: GpuBackend> Drop for WorkbenchEngine<B> {
    fn drop(&mut self) {
        self.release_resources();
    }
}
