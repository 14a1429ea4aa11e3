//! Shader variants
//!
//! - [`variant_key`]: the key families and their dimensions
//! - [`shader_gen`]: deterministic source assembly per key
//! - [`cache`]: the lazily filled key → shader map

pub mod cache;
pub mod shader_gen;
pub mod variant_key;

pub use cache::ShaderCache;
pub use shader_gen::{ShaderDefine, ShaderSource};
pub use variant_key::{
    ColorType, GeometryType, PipelineType, PrepassKey, ResolveKey, ShaderVariantKey, ShadingType,
    UtilityShader,
};
