//! Shader source assembly
//!
//! Turns a [`ShaderVariantKey`] into the [`ShaderSource`] handed to the
//! backend: the logical program name, the template it is built from, and the
//! preprocessor defines derived from the key fields. Assembly is
//! deterministic; the same key always yields the same source and hash.

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::xxh3_128;

use super::variant_key::{
    ColorType, GeometryType, PipelineType, PrepassKey, ResolveKey, ShaderVariantKey, ShadingType,
};

/// A single `#define NAME VALUE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderDefine {
    pub name: &'static str,
    pub value: String,
}

/// Everything the backend needs to compile one variant.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    /// Unique variant name (also used in logs and errors).
    pub name: String,
    /// Logical template the variant is built from.
    pub template: &'static str,
    pub defines: Vec<ShaderDefine>,
    /// xxh3-128 of the assembled preamble; identifies the source.
    pub hash: u128,
}

impl ShaderSource {
    fn new(name: String, template: &'static str, defines: Vec<ShaderDefine>) -> Self {
        let hash = xxh3_128(Self::preamble(template, &defines).as_bytes());
        Self {
            name,
            template,
            defines,
            hash,
        }
    }

    /// `#define` block followed by the template include, as fed to the
    /// backend's preprocessor.
    #[must_use]
    pub fn preamble_text(&self) -> String {
        Self::preamble(self.template, &self.defines)
    }

    fn preamble(template: &str, defines: &[ShaderDefine]) -> String {
        let mut out = String::new();
        for d in defines {
            out.push_str("#define ");
            out.push_str(d.name);
            if !d.value.is_empty() {
                out.push(' ');
                out.push_str(&d.value);
            }
            out.push('\n');
        }
        out.push_str("#include \"");
        out.push_str(template);
        out.push_str("\"\n");
        out
    }

    #[must_use]
    pub fn has_define(&self, name: &str) -> bool {
        self.defines.iter().any(|d| d.name == name)
    }
}

impl PartialEq for ShaderSource {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.name == other.name
    }
}

impl Eq for ShaderSource {}

impl Hash for ShaderSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Defines(Vec<ShaderDefine>);

impl Defines {
    fn flag(&mut self, name: &'static str) {
        self.0.push(ShaderDefine {
            name,
            value: String::new(),
        });
    }

    fn flag_if(&mut self, cond: bool, name: &'static str) {
        if cond {
            self.flag(name);
        }
    }
}

fn pipeline_defines(d: &mut Defines, pipeline: PipelineType) {
    match pipeline {
        PipelineType::Opaque => d.flag("WORKBENCH_PIPELINE_OPAQUE"),
        PipelineType::Transparent => d.flag("WORKBENCH_PIPELINE_TRANSPARENT"),
    }
}

fn shading_defines(d: &mut Defines, shading: ShadingType) {
    match shading {
        ShadingType::Flat => d.flag("WORKBENCH_LIGHTING_FLAT"),
        ShadingType::Studio => d.flag("WORKBENCH_LIGHTING_STUDIO"),
        ShadingType::Matcap => d.flag("WORKBENCH_LIGHTING_MATCAP"),
    }
}

fn prepass_source(key: PrepassKey, name: String) -> ShaderSource {
    let mut d = Defines::default();
    pipeline_defines(&mut d, key.pipeline);
    shading_defines(&mut d, key.shading);
    match key.geometry {
        GeometryType::Mesh => d.flag("WORKBENCH_GEOMETRY_MESH"),
        GeometryType::Curves => d.flag("WORKBENCH_GEOMETRY_CURVES"),
        GeometryType::PointCloud => d.flag("WORKBENCH_GEOMETRY_POINTCLOUD"),
    }
    match key.color {
        ColorType::Material => d.flag("WORKBENCH_COLOR_MATERIAL"),
        ColorType::Texture => d.flag("WORKBENCH_COLOR_TEXTURE"),
    }
    d.flag_if(key.clip, "USE_CLIP_PLANES");
    ShaderSource::new(name, "workbench_prepass", d.0)
}

fn resolve_source(key: ResolveKey, name: String) -> ShaderSource {
    let mut d = Defines::default();
    pipeline_defines(&mut d, key.pipeline);
    shading_defines(&mut d, key.shading);
    d.flag_if(key.cavity, "WORKBENCH_CAVITY");
    d.flag_if(key.curvature, "WORKBENCH_CURVATURE");
    ShaderSource::new(name, "workbench_composite", d.0)
}

/// Assembles the source of `key`.
#[must_use]
pub fn assemble(key: ShaderVariantKey) -> ShaderSource {
    let name = key.to_string();
    match key {
        ShaderVariantKey::Prepass(k) => prepass_source(k, name),
        ShaderVariantKey::Resolve(k) => resolve_source(k, name),
        ShaderVariantKey::Utility(u) => ShaderSource::new(name, u.name(), Vec::new()),
    }
}
