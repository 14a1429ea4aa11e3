//! Shader variant cache tests
//!
//! Tests for:
//! - One compilation per variant key
//! - Failed compilations are not cached and are retried
//! - release_all frees every shader exactly once
//! - Variant keys map to distinct sources

use workbench::errors::WorkbenchError;
use workbench::renderer::backend::HeadlessBackend;
use workbench::renderer::pipeline::{
    ColorType, GeometryType, PipelineType, PrepassKey, ShaderCache, ShadingType, UtilityShader,
};

fn opaque_mesh_key() -> PrepassKey {
    PrepassKey {
        pipeline: PipelineType::Opaque,
        geometry: GeometryType::Mesh,
        color: ColorType::Material,
        shading: ShadingType::Studio,
        clip: false,
    }
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn cache_compiles_each_variant_once() {
    let mut backend = HeadlessBackend::new();
    let mut cache = ShaderCache::new();

    let a = cache.get(&mut backend, opaque_mesh_key()).unwrap();
    let b = cache.get(&mut backend, opaque_mesh_key()).unwrap();
    assert_eq!(a, b);
    assert_eq!(backend.stats().shaders_compiled, 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_distinguishes_every_key_dimension() {
    let mut backend = HeadlessBackend::new();
    let mut cache = ShaderCache::new();
    let base = opaque_mesh_key();

    let variants = [
        base,
        PrepassKey { pipeline: PipelineType::Transparent, ..base },
        PrepassKey { geometry: GeometryType::Curves, ..base },
        PrepassKey { color: ColorType::Texture, ..base },
        PrepassKey { shading: ShadingType::Matcap, ..base },
        PrepassKey { clip: true, ..base },
    ];
    let mut handles = Vec::new();
    for key in variants {
        handles.push(cache.get(&mut backend, key).unwrap());
    }
    handles.sort();
    handles.dedup();
    assert_eq!(handles.len(), variants.len());
    assert_eq!(backend.stats().shaders_compiled, variants.len());
}

#[test]
fn cache_names_shaders_after_their_key() {
    let mut backend = HeadlessBackend::new();
    let mut cache = ShaderCache::new();

    let shader = cache
        .utility_shader_get(&mut backend, UtilityShader::TaaAccumulation)
        .unwrap();
    assert_eq!(backend.shader_name(shader), Some("workbench_taa"));

    let prepass = cache
        .get(&mut backend, PrepassKey { clip: true, ..opaque_mesh_key() })
        .unwrap();
    let name = backend.shader_name(prepass).unwrap();
    assert!(name.starts_with("workbench_prepass_"));
    assert!(name.ends_with("_clip"));
}

// ============================================================================
// Failure and release
// ============================================================================

#[test]
fn failed_compilation_is_retried() {
    let mut backend = HeadlessBackend::new();
    let mut cache = ShaderCache::new();
    backend.fail_shader("workbench_smaa_stage_0");

    let err = cache
        .utility_shader_get(&mut backend, UtilityShader::SmaaEdgeDetect)
        .unwrap_err();
    assert!(matches!(err, WorkbenchError::ShaderCompile { .. }));
    assert!(!cache.contains(UtilityShader::SmaaEdgeDetect));
    assert!(cache.is_empty());

    // A healthy backend compiles it on the next request.
    let mut healthy = HeadlessBackend::new();
    assert!(
        cache
            .utility_shader_get(&mut healthy, UtilityShader::SmaaEdgeDetect)
            .is_ok()
    );
    assert_eq!(cache.len(), 1);
}

#[test]
fn release_all_frees_each_shader_once() {
    let mut backend = HeadlessBackend::new();
    let mut cache = ShaderCache::new();
    cache.get(&mut backend, opaque_mesh_key()).unwrap();
    cache.utility_shader_get(&mut backend, UtilityShader::Outline).unwrap();
    cache
        .resolve_shader_get(&mut backend, PipelineType::Opaque, ShadingType::Flat, true, false)
        .unwrap();

    cache.release_all(&mut backend);
    assert!(cache.is_empty());
    assert_eq!(backend.live_shader_count(), 0);
    assert_eq!(backend.stats().shaders_freed, 3);

    cache.release_all(&mut backend);
    assert_eq!(backend.stats().invalid_frees, 0);
}
