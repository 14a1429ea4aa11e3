//! WorkbenchEngine tests
//!
//! Tests for:
//! - Frame protocol errors (sync / draw outside a frame)
//! - Object routing into opaque, transparent and in-front passes
//! - Texture sub-pass deduplication
//! - Pass submission order
//! - TAA convergence, resets and image-render SMAA
//! - Depth of field enablement
//! - Resource release

use glam::{Mat4, UVec2, Vec3};
use workbench::errors::WorkbenchError;
use workbench::renderer::backend::{GpuBackend, HeadlessBackend, TextureDesc, TextureHandle};
use workbench::renderer::graph::BatchHandle;
use workbench::scene::{
    AntiAliasingMode, DofSettings, DrawableObject, Extension, FrameInput, ImageNode, ImageRef,
    ImageTexture, Interpolation, MaterialData, ObjectFlags, ShadingColor, ShadingFlags,
    ViewportTargets,
};
use workbench::{FrameStatus, WorkbenchEngine};

// ============================================================================
// Helper
// ============================================================================

const SIZE: UVec2 = UVec2::new(64, 48);

fn setup() -> (WorkbenchEngine<HeadlessBackend>, FrameInput) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut backend = HeadlessBackend::new();
    let targets = ViewportTargets {
        color: backend
            .allocate_texture(&TextureDesc::target("host_color", SIZE, wgpu::TextureFormat::Rgba8Unorm))
            .unwrap(),
        depth: backend
            .allocate_texture(&TextureDesc::target(
                "host_depth",
                SIZE,
                wgpu::TextureFormat::Depth24PlusStencil8,
            ))
            .unwrap(),
    };
    (WorkbenchEngine::new(backend), FrameInput::new(SIZE, targets))
}

fn image_texture(engine: &mut WorkbenchEngine<HeadlessBackend>, label: &'static str) -> TextureHandle {
    engine
        .backend_mut()
        .allocate_texture(&TextureDesc::sampled(label, UVec2::new(4, 4), wgpu::TextureFormat::Rgba8Unorm))
        .unwrap()
}

fn textured(name: &str, batch: u32, image: ImageRef) -> DrawableObject {
    DrawableObject::mesh(name, BatchHandle(batch)).with_material(MaterialData {
        active_texture: Some(ImageNode::Image {
            image,
            user: None,
            interpolation: Interpolation::Linear,
            extension: Extension::Repeat,
        }),
        ..Default::default()
    })
}

fn glass(name: &str, batch: u32) -> DrawableObject {
    DrawableObject::mesh(name, BatchHandle(batch)).with_material(MaterialData {
        alpha: 0.4,
        ..Default::default()
    })
}

fn render(
    engine: &mut WorkbenchEngine<HeadlessBackend>,
    frame: &FrameInput,
    objects: &[DrawableObject],
) -> FrameStatus {
    engine.init(frame).unwrap();
    for object in objects {
        engine.object_sync(object).unwrap();
    }
    engine.draw().unwrap()
}

fn pass_names(backend: &HeadlessBackend) -> Vec<&'static str> {
    backend.submissions().iter().map(|s| s.pass).collect()
}

fn position(names: &[&str], pass: &str) -> usize {
    names
        .iter()
        .position(|n| *n == pass)
        .unwrap_or_else(|| panic!("pass '{pass}' not submitted in {names:?}"))
}

// ============================================================================
// Frame protocol
// ============================================================================

#[test]
fn object_sync_outside_frame_fails() {
    let (mut engine, _frame) = setup();
    let cube = DrawableObject::mesh("Cube", BatchHandle(0));
    assert!(matches!(
        engine.object_sync(&cube),
        Err(WorkbenchError::Configuration(_))
    ));
}

#[test]
fn draw_outside_frame_fails() {
    let (mut engine, frame) = setup();
    assert!(engine.draw().is_err());

    render(&mut engine, &frame, &[]);
    // The frame ended with the previous draw.
    assert!(engine.draw().is_err());
}

#[test]
fn frame_textures_return_to_pool_after_draw() {
    let (mut engine, frame) = setup();
    render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);
    let resources = engine.resources();
    assert_eq!(resources.pool.active_count(), 0);
    assert!(resources.color_tx.handle().is_none());
    assert!(resources.depth_tx.handle().is_none());
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn empty_scene_only_anti_aliases() {
    let (mut engine, frame) = setup();
    render(&mut engine, &frame, &[]);

    assert!(engine.opaque().is_empty());
    assert!(engine.transparent().is_empty());
    let names = pass_names(engine.backend());
    assert!(names.iter().all(|n| !n.starts_with("Opaque") && !n.starts_with("Transparent")));
    assert!(names.contains(&"AA.TaaAccumulation"));
    assert!(names.contains(&"AA.SmaaResolve"));
    assert_eq!(engine.backend().stats().unresolved_bindings, 0);
}

#[test]
fn opaque_object_draws_gbuffer_then_resolve() {
    let (mut engine, frame) = setup();
    render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);

    assert!(!engine.opaque().gbuffer_ps.is_empty());
    assert!(engine.opaque().gbuffer_in_front_ps.is_empty());
    assert!(engine.transparent().is_empty());

    let names = pass_names(engine.backend());
    let gbuffer = position(&names, "Opaque.Gbuffer");
    let deferred = position(&names, "Opaque.Deferred");
    let taa = position(&names, "AA.TaaAccumulation");
    assert!(gbuffer < deferred && deferred < taa);
    assert!(!names.contains(&"Opaque.GbufferInFront"));
    assert_eq!(engine.backend().stats().unresolved_bindings, 0);
}

#[test]
fn transparent_material_skips_gbuffer() {
    let (mut engine, frame) = setup();
    render(&mut engine, &frame, &[glass("Glass", 0)]);

    assert!(engine.opaque().is_empty());
    assert!(!engine.transparent().accumulation_ps.is_empty());
    let names = pass_names(engine.backend());
    assert!(position(&names, "Transparent.Accumulation") < position(&names, "Transparent.Resolve"));
    assert!(!names.contains(&"Opaque.Deferred"));
}

#[test]
fn xray_routes_everything_to_transparent() {
    let (mut engine, mut frame) = setup();
    frame.shading.flags = ShadingFlags::XRAY;
    frame.shading.xray_alpha = 0.5;
    render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);

    assert!(engine.opaque().is_empty());
    assert!(!engine.transparent().accumulation_ps.is_empty());
}

#[test]
fn in_front_objects_draw_before_the_scene() {
    let (mut engine, frame) = setup();
    let objects = [
        DrawableObject::mesh("Cube", BatchHandle(0)),
        DrawableObject::mesh("Gizmo", BatchHandle(1)).with_flags(ObjectFlags::IN_FRONT),
    ];
    let copies_before = engine.backend().stats().texture_copies;
    render(&mut engine, &frame, &objects);

    assert!(!engine.opaque().gbuffer_in_front_ps.is_empty());
    let names = pass_names(engine.backend());
    assert!(position(&names, "Opaque.GbufferInFront") < position(&names, "Opaque.Gbuffer"));
    // In-front depth snapshot, plus the sample-0 depth copies.
    assert!(engine.backend().stats().texture_copies >= copies_before + 3);
}

#[test]
fn outline_adds_transparent_depth_and_outline_passes() {
    let (mut engine, mut frame) = setup();
    frame.shading.flags = ShadingFlags::OBJECT_OUTLINE;
    render(
        &mut engine,
        &frame,
        &[DrawableObject::mesh("Cube", BatchHandle(0)), glass("Glass", 1)],
    );

    assert!(engine.outline().is_enabled());
    assert!(!engine.transparent_depth().main_ps.is_empty());
    let names = pass_names(engine.backend());
    let accumulation = position(&names, "Transparent.Accumulation");
    let depth = position(&names, "TransparentDepth.Main");
    let outline = position(&names, "Outline");
    assert!(accumulation < depth && depth < outline);
    assert!(outline < position(&names, "AA.TaaAccumulation"));
}

#[test]
fn transparent_depth_is_skipped_without_outline() {
    let (mut engine, frame) = setup();
    render(&mut engine, &frame, &[glass("Glass", 0)]);
    assert!(engine.transparent_depth().is_empty());
    assert!(!engine.outline().is_enabled());
}

#[test]
fn every_material_slot_is_drawn() {
    let (mut engine, frame) = setup();
    let mut object = DrawableObject::mesh("Multi", BatchHandle(0));
    object.materials = vec![Some(MaterialData::default()), None, Some(MaterialData::default())];
    object.batches.per_material = [BatchHandle(0), BatchHandle(1), BatchHandle(2)]
        .into_iter()
        .collect();
    render(&mut engine, &frame, &[object]);

    assert_eq!(engine.opaque().gbuffer_ps.pass().draw_count(), 3);
    assert_eq!(engine.resources().material_buf.len(), 3);
}

#[test]
fn material_object_without_slot_batches_draws_whole_mesh() {
    let (mut engine, frame) = setup();
    let mut object = DrawableObject::mesh("Merged", BatchHandle(7))
        .with_material(MaterialData::default());
    object.batches.per_material.clear();
    render(&mut engine, &frame, &[object]);

    assert_eq!(engine.opaque().gbuffer_ps.pass().draw_count(), 1);
    assert_eq!(engine.resources().material_buf.len(), 1);
}

#[test]
fn single_color_uses_one_batch() {
    let (mut engine, mut frame) = setup();
    frame.shading.color = ShadingColor::Single;
    frame.shading.single_color = Vec3::new(1.0, 0.0, 0.0);
    let mut object = DrawableObject::mesh("Multi", BatchHandle(0));
    object.materials = vec![Some(MaterialData::default()), Some(MaterialData::default())];
    object.batches.per_material = [BatchHandle(1), BatchHandle(2)].into_iter().collect();
    render(&mut engine, &frame, &[object]);

    assert_eq!(engine.opaque().gbuffer_ps.pass().draw_count(), 1);
    let material = engine.resources().material_buf.items()[0];
    assert_eq!(material.base_color, Vec3::new(1.0, 0.0, 0.0));
}

// ============================================================================
// Texture sub-passes
// ============================================================================

#[test]
fn texture_subpasses_are_shared_per_texture() {
    let (mut engine, mut frame) = setup();
    frame.shading.color = ShadingColor::Texture;
    let wood = image_texture(&mut engine, "wood");
    let stone = image_texture(&mut engine, "stone");

    let objects = [
        textured("A", 0, ImageRef::still("Wood", ImageTexture::Single(wood))),
        textured("B", 1, ImageRef::still("Wood", ImageTexture::Single(wood))),
        textured("C", 2, ImageRef::still("Stone", ImageTexture::Single(stone))),
        textured("D", 3, ImageRef::still("Broken", ImageTexture::Missing)),
    ];
    render(&mut engine, &frame, &objects);

    assert_eq!(engine.opaque().gbuffer_ps.texture_subpass_count(), 2);

    let backend = engine.backend();
    let gbuffer = backend
        .submissions_named("Opaque.Gbuffer")
        .next()
        .expect("gbuffer submitted");
    assert_eq!(gbuffer.subpasses.iter().filter(|s| *s == "Wood").count(), 1);
    assert_eq!(gbuffer.subpasses.iter().filter(|s| *s == "Stone").count(), 1);
    assert!(!gbuffer.subpasses.iter().any(|s| s == "Broken"));
    assert!(gbuffer.binds_texture(wood));
    assert!(gbuffer.binds_texture(stone));
    assert_eq!(gbuffer.draw_count, 4);
    assert_eq!(backend.stats().unresolved_bindings, 0);
}

#[test]
fn texture_subpasses_reset_every_frame() {
    let (mut engine, mut frame) = setup();
    frame.shading.color = ShadingColor::Texture;
    let wood = image_texture(&mut engine, "wood");
    let object = textured("A", 0, ImageRef::still("Wood", ImageTexture::Single(wood)));

    render(&mut engine, &frame, std::slice::from_ref(&object));
    engine.init(&frame).unwrap();
    assert_eq!(engine.opaque().gbuffer_ps.texture_subpass_count(), 0);
    engine.object_sync(&object).unwrap();
    assert_eq!(engine.opaque().gbuffer_ps.texture_subpass_count(), 1);
    engine.draw().unwrap();
}

// ============================================================================
// Temporal accumulation
// ============================================================================

#[test]
fn taa_converges_after_sample_budget() {
    let (mut engine, frame) = setup();
    let objects = [DrawableObject::mesh("Cube", BatchHandle(0))];
    let budget = AntiAliasingMode::Samples8.sample_count();

    for i in 1..=budget {
        let status = render(&mut engine, &frame, &objects);
        assert_eq!(status.sample, i);
        assert_eq!(status.sample_len, budget);
        assert_eq!(status.converged, i == budget);
        assert_eq!(status.needs_redraw, i < budget);
    }
    assert!(engine.anti_aliasing().weight_accum() > 0.0);

    engine.backend_mut().clear_submissions();
    let status = render(&mut engine, &frame, &objects);
    assert!(status.converged);
    assert_eq!(status.sample, budget);

    // Converged frames only re-resolve the history.
    let names = pass_names(engine.backend());
    assert!(!names.contains(&"Opaque.Gbuffer"));
    assert!(!names.contains(&"AA.TaaAccumulation"));
    assert!(names.contains(&"AA.SmaaResolve"));
}

#[test]
fn scene_update_after_convergence_redraws_geometry() {
    let (mut engine, frame) = setup();
    let cube = DrawableObject::mesh("Cube", BatchHandle(0));
    let budget = AntiAliasingMode::Samples8.sample_count();
    for _ in 0..budget {
        render(&mut engine, &frame, std::slice::from_ref(&cube));
    }
    assert!(engine.anti_aliasing().is_converged());

    engine.view_update();
    engine.backend_mut().clear_submissions();
    let sphere = DrawableObject::mesh("Sphere", BatchHandle(1));
    let status = render(&mut engine, &frame, &[cube, sphere]);

    assert_eq!(status.sample, 1);
    assert!(!status.converged);
    assert!(status.needs_redraw);
    let names = pass_names(engine.backend());
    assert!(names.contains(&"Opaque.Gbuffer"));
    assert!(names.contains(&"AA.TaaAccumulation"));
    assert_eq!(engine.opaque().gbuffer_ps.pass().draw_count(), 2);
}

#[test]
fn settings_change_after_convergence_redraws_geometry() {
    let (mut engine, mut frame) = setup();
    let objects = [DrawableObject::mesh("Cube", BatchHandle(0))];
    let budget = AntiAliasingMode::Samples8.sample_count();
    for _ in 0..budget {
        render(&mut engine, &frame, &objects);
    }

    frame.clip_planes.push(glam::Vec4::new(0.0, 0.0, 1.0, 0.0));
    frame.display.cavity_samples = 3;
    engine.backend_mut().clear_submissions();
    let status = render(&mut engine, &frame, &objects);

    assert_eq!(status.sample, 1);
    assert!(pass_names(engine.backend()).contains(&"Opaque.Gbuffer"));
}

#[test]
fn camera_move_restarts_accumulation() {
    let (mut engine, mut frame) = setup();
    for _ in 0..3 {
        render(&mut engine, &frame, &[]);
    }
    assert_eq!(engine.anti_aliasing().sample(), 3);

    frame.camera.view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    let status = render(&mut engine, &frame, &[]);
    assert_eq!(status.sample, 1);
}

#[test]
fn resolution_change_restarts_accumulation() {
    let (mut engine, mut frame) = setup();
    for _ in 0..4 {
        render(&mut engine, &frame, &[]);
    }

    frame.resolution = UVec2::new(32, 32);
    let status = render(&mut engine, &frame, &[]);
    assert_eq!(status.sample, 1);
    assert!(engine.anti_aliasing().history_valid());
    assert_eq!(engine.scene_state().resolution, UVec2::new(32, 32));
}

#[test]
fn navigation_draws_a_single_sample() {
    let (mut engine, mut frame) = setup();
    frame.is_navigating = true;
    let status = render(&mut engine, &frame, &[]);
    assert_eq!(status.sample_len, 1);
    assert!(status.converged);

    // The first frame after navigation restarts with the full budget.
    frame.is_navigating = false;
    let status = render(&mut engine, &frame, &[]);
    assert_eq!(status.sample, 1);
    assert_eq!(status.sample_len, 8);
}

#[test]
fn anti_aliasing_off_copies_color_directly() {
    let (mut engine, mut frame) = setup();
    frame.display.viewport_aa = AntiAliasingMode::Off;
    let copies_before = engine.backend().stats().texture_copies;
    let status = render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);

    assert_eq!(status.sample_len, 0);
    assert!(status.converged);
    assert!(!status.needs_redraw);
    assert!(pass_names(engine.backend()).iter().all(|n| !n.starts_with("AA.")));
    assert_eq!(engine.backend().stats().texture_copies, copies_before + 2);
}

#[test]
fn image_render_resolves_smaa_on_last_sample_only() {
    let (mut engine, mut frame) = setup();
    frame.is_image_render = true;
    frame.display.render_aa = AntiAliasingMode::Samples5;
    let objects = [DrawableObject::mesh("Cube", BatchHandle(0))];

    for i in 1..=5 {
        engine.backend_mut().clear_submissions();
        let status = render(&mut engine, &frame, &objects);
        let resolves = engine.backend().submissions_named("AA.SmaaResolve").count();
        assert_eq!(resolves, usize::from(i == 5), "sample {i}");
        assert_eq!(status.converged, i == 5);
    }
}

#[test]
fn smaa_lookup_tables_are_size_checked() {
    let (mut engine, _frame) = setup();
    assert!(matches!(
        engine.set_smaa_lookup_tables(&[0; 16], &[0; 16]),
        Err(WorkbenchError::Configuration(_))
    ));
    let area = vec![0u8; 160 * 560 * 2];
    let search = vec![0u8; 64 * 16];
    engine.set_smaa_lookup_tables(&area, &search).unwrap();
    assert_eq!(engine.backend().stats().texture_uploads, 2);
}

// ============================================================================
// Depth of field
// ============================================================================

#[test]
fn dof_is_skipped_outside_camera_view() {
    let (mut engine, mut frame) = setup();
    frame.camera.dof = Some(DofSettings::default());
    render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);

    assert!(!engine.dof().is_enabled());
    assert!(pass_names(engine.backend()).iter().all(|n| !n.starts_with("Dof.")));
}

#[test]
fn dof_runs_in_camera_view_and_frees_when_disabled() {
    let (mut engine, mut frame) = setup();
    frame.camera.is_camera_view = true;
    frame.camera.dof = Some(DofSettings {
        aperture_blades: 6,
        ..Default::default()
    });
    render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);

    assert!(engine.dof().is_enabled());
    let names = pass_names(engine.backend());
    let resolve = position(&names, "Dof.Resolve");
    assert!(position(&names, "Dof.Prepare") < resolve);
    assert!(resolve < position(&names, "AA.TaaAccumulation"));
    assert_eq!(engine.backend().stats().unresolved_bindings, 0);

    let freed_before = engine.backend().stats().textures_freed;
    frame.camera.dof = None;
    render(&mut engine, &frame, &[DrawableObject::mesh("Cube", BatchHandle(0))]);
    assert!(!engine.dof().is_enabled());
    // Source and circle-of-confusion targets.
    assert_eq!(engine.backend().stats().textures_freed, freed_before + 2);
}

// ============================================================================
// Release
// ============================================================================

#[test]
fn release_resources_frees_everything_but_host_targets() {
    let (mut engine, mut frame) = setup();
    frame.shading.flags = ShadingFlags::OBJECT_OUTLINE | ShadingFlags::CAVITY;
    frame.camera.is_camera_view = true;
    frame.camera.dof = Some(DofSettings::default());
    let objects = [
        DrawableObject::mesh("Cube", BatchHandle(0)),
        glass("Glass", 1).with_flags(ObjectFlags::IN_FRONT),
    ];
    render(&mut engine, &frame, &objects);
    render(&mut engine, &frame, &objects);

    engine.release_resources();
    let backend = engine.backend();
    assert_eq!(backend.live_shader_count(), 0);
    assert_eq!(backend.live_buffer_count(), 0);
    assert_eq!(backend.live_framebuffer_count(), 0);
    assert_eq!(backend.live_texture_count(), 2);
    assert_eq!(backend.stats().invalid_frees, 0);
}

#[test]
fn engine_renders_again_after_release() {
    let (mut engine, frame) = setup();
    let objects = [DrawableObject::mesh("Cube", BatchHandle(0))];
    render(&mut engine, &frame, &objects);
    engine.release_resources();

    engine.backend_mut().clear_submissions();
    render(&mut engine, &frame, &objects);
    assert!(pass_names(engine.backend()).contains(&"Opaque.Gbuffer"));
    assert_eq!(engine.backend().stats().unresolved_bindings, 0);
}
