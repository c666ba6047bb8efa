//! Shader composition through named hook points
//!
//! Base stages are WGSL templates whose extension points are declared with
//! `// @hook <name>` lines. Extensions add uniforms and defines and insert or
//! replace code at those hooks; nothing is located by searching shader text.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use glam::Mat4;

use crate::core::{Error, Result};

const STANDARD_VERTEX: &str = include_str!("../../shaders/standard_vertex.wgsl");
const STANDARD_FRAGMENT: &str = include_str!("../../shaders/standard_fragment.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Vertex,
    Fragment,
}

/// Named extension points of the standard stages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookPoint {
    /// Extra fields of the vertex output struct
    VertexVaryings,
    /// Bindings and helpers visible to the vertex entry point
    VertexParams,
    /// Computes `out.clip_position` and `out.world_position`
    VertexProject,
    /// Extra fields of the fragment input struct; must mirror the vertex varyings
    FragmentVaryings,
    /// Bindings and helpers visible to the fragment entry point
    FragmentParams,
    /// Runs before the base colour is combined
    FragmentDiffuse,
    /// Establishes the shading normal
    FragmentNormal,
    /// Applies a tangent-space normal map to the shading normal
    FragmentNormalMap,
    /// Multiplies the base colour by the colour map
    FragmentMap,
}

impl HookPoint {
    pub const ALL: [HookPoint; 9] = [
        HookPoint::VertexVaryings,
        HookPoint::VertexParams,
        HookPoint::VertexProject,
        HookPoint::FragmentVaryings,
        HookPoint::FragmentParams,
        HookPoint::FragmentDiffuse,
        HookPoint::FragmentNormal,
        HookPoint::FragmentNormalMap,
        HookPoint::FragmentMap,
    ];

    pub fn stage(self) -> StageKind {
        match self {
            HookPoint::VertexVaryings | HookPoint::VertexParams | HookPoint::VertexProject => StageKind::Vertex,
            _ => StageKind::Fragment,
        }
    }

    /// Marker name used in templates
    pub fn name(self) -> &'static str {
        match self {
            HookPoint::VertexVaryings => "vertex_varyings",
            HookPoint::VertexParams => "vertex_params",
            HookPoint::VertexProject => "vertex_project",
            HookPoint::FragmentVaryings => "fragment_varyings",
            HookPoint::FragmentParams => "fragment_params",
            HookPoint::FragmentDiffuse => "fragment_diffuse",
            HookPoint::FragmentNormal => "fragment_normal",
            HookPoint::FragmentNormalMap => "fragment_normal_map",
            HookPoint::FragmentMap => "fragment_map",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.name() == name)
    }
}

#[derive(Clone, Debug)]
enum Section {
    Code(String),
    Hook(HookPoint),
}

#[derive(Clone, Debug, Default)]
struct HookSlot {
    default: String,
    replacement: Option<String>,
    inserted: Vec<String>,
}

/// One shader stage: template sections plus per-hook code
#[derive(Clone, Debug)]
pub struct ShaderStage {
    kind: StageKind,
    sections: Vec<Section>,
    hooks: BTreeMap<HookPoint, HookSlot>,
}

impl ShaderStage {
    /// Parse a template. A `// @hook <name>` line opens a hook whose default
    /// body runs until the matching `// @end` line.
    pub fn parse(kind: StageKind, template: &str) -> Result<Self> {
        let mut sections = Vec::new();
        let mut hooks = BTreeMap::new();
        let mut code = String::new();
        let mut open: Option<(HookPoint, String)> = None;

        for line in template.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix("// @hook ") {
                if open.is_some() {
                    return Err(Error::config(format!("nested shader hook '{}'", name)));
                }
                let hook = HookPoint::from_name(name.trim())
                    .ok_or_else(|| Error::config(format!("unknown shader hook '{}'", name.trim())))?;
                if hook.stage() != kind {
                    return Err(Error::config(format!("hook '{}' does not belong to the {:?} stage", hook.name(), kind)));
                }
                if hooks.contains_key(&hook) {
                    return Err(Error::config(format!("shader hook '{}' declared twice", hook.name())));
                }
                sections.push(Section::Code(std::mem::take(&mut code)));
                open = Some((hook, String::new()));
            } else if trimmed == "// @end" {
                let (hook, default) = open
                    .take()
                    .ok_or_else(|| Error::config("shader hook end without a matching hook"))?;
                sections.push(Section::Hook(hook));
                hooks.insert(hook, HookSlot { default, ..Default::default() });
            } else {
                let target = match &mut open {
                    Some((_, body)) => body,
                    None => &mut code,
                };
                target.push_str(line);
                target.push('\n');
            }
        }

        if let Some((hook, _)) = open {
            return Err(Error::config(format!("shader hook '{}' is never closed", hook.name())));
        }
        sections.push(Section::Code(code));
        Ok(Self { kind, sections, hooks })
    }

    pub fn standard_vertex() -> Result<Self> {
        Self::parse(StageKind::Vertex, STANDARD_VERTEX)
    }

    pub fn standard_fragment() -> Result<Self> {
        Self::parse(StageKind::Fragment, STANDARD_FRAGMENT)
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn has_hook(&self, hook: HookPoint) -> bool {
        self.hooks.contains_key(&hook)
    }

    /// Insert code ahead of the hook's body
    pub fn inject(&mut self, hook: HookPoint, code: &str) -> Result<()> {
        self.slot(hook)?.inserted.push(code.to_string());
        Ok(())
    }

    /// Replace the hook's default body
    pub fn replace(&mut self, hook: HookPoint, code: &str) -> Result<()> {
        self.slot(hook)?.replacement = Some(code.to_string());
        Ok(())
    }

    /// Drop the hook's default body
    pub fn disable(&mut self, hook: HookPoint) -> Result<()> {
        self.replace(hook, "")
    }

    /// Assemble the final source
    pub fn source(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            match section {
                Section::Code(code) => out.push_str(code),
                Section::Hook(hook) => {
                    if let Some(slot) = self.hooks.get(hook) {
                        for code in &slot.inserted {
                            out.push_str(code);
                            if !code.ends_with('\n') {
                                out.push('\n');
                            }
                        }
                        out.push_str(slot.replacement.as_deref().unwrap_or(&slot.default));
                    }
                }
            }
        }
        out
    }

    fn slot(&mut self, hook: HookPoint) -> Result<&mut HookSlot> {
        let kind = self.kind;
        self.hooks.get_mut(&hook).ok_or_else(|| {
            Error::config(format!("hook '{}' is not available in the {:?} stage", hook.name(), kind))
        })
    }
}

/// Atlas texture bound to a sampler slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSlot {
    Albedo,
    NormalDepth,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    UInt(u32),
    Mat4(Mat4),
    Texture(TextureSlot),
}

/// A material's additions to a standard program.
pub trait ShaderExtension {
    fn contribute_uniforms(&self, uniforms: &mut BTreeMap<String, UniformValue>);

    fn contribute_defines(&self, defines: &mut BTreeMap<String, bool>);

    fn transform_vertex_stage(&self, stage: &mut ShaderStage) -> Result<()>;

    fn transform_fragment_stage(&self, stage: &mut ShaderStage) -> Result<()>;

    /// Distinguishes programs that differ in defines or stage code
    fn cache_key(&self) -> String;
}

/// Fully composed program for one extension
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    pub uniforms: BTreeMap<String, UniformValue>,
    pub defines: BTreeMap<String, bool>,
    pub vertex: String,
    pub fragment: String,
    pub cache_key: String,
}

impl ShaderProgram {
    pub fn build(extension: &dyn ShaderExtension) -> Result<Self> {
        let mut uniforms = BTreeMap::new();
        let mut defines = BTreeMap::new();
        extension.contribute_uniforms(&mut uniforms);
        extension.contribute_defines(&mut defines);

        let mut vertex = ShaderStage::standard_vertex()?;
        let mut fragment = ShaderStage::standard_fragment()?;
        extension.transform_vertex_stage(&mut vertex)?;
        extension.transform_fragment_stage(&mut fragment)?;

        let header = define_constants(&defines);
        let cache_key = extension.cache_key();
        log::debug!("Composed shader program '{}'", cache_key);

        Ok(Self {
            uniforms,
            vertex: format!("{}{}", header, vertex.source()),
            fragment: format!("{}{}", header, fragment.source()),
            defines,
            cache_key,
        })
    }
}

/// WGSL has no preprocessor; defines become module-scope constants.
fn define_constants(defines: &BTreeMap<String, bool>) -> String {
    let mut out = String::new();
    for (name, value) in defines {
        let _ = writeln!(out, "const {}: bool = {};", name, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
fn main() {
// @hook fragment_diffuse
// @end
    var color = vec4<f32>(1.0);
// @hook fragment_map
    color = color * textureSample(map, map_sampler, uv);
// @end
}
";

    #[test]
    fn test_parse_and_assemble_defaults() {
        let stage = ShaderStage::parse(StageKind::Fragment, TEMPLATE).unwrap();
        assert!(stage.has_hook(HookPoint::FragmentMap));
        assert!(!stage.has_hook(HookPoint::FragmentNormal));
        let source = stage.source();
        assert!(source.contains("textureSample(map"));
        assert!(!source.contains("@hook"));
    }

    #[test]
    fn test_inject_and_replace() {
        let mut stage = ShaderStage::parse(StageKind::Fragment, TEMPLATE).unwrap();
        stage.inject(HookPoint::FragmentDiffuse, "let blended = vec4<f32>(0.5);").unwrap();
        stage.replace(HookPoint::FragmentMap, "    color = color * blended;\n").unwrap();
        let source = stage.source();
        let inject_at = source.find("let blended").unwrap();
        let base_at = source.find("var color").unwrap();
        assert!(inject_at < base_at);
        assert!(source.contains("color * blended"));
        assert!(!source.contains("textureSample"));
    }

    #[test]
    fn test_missing_hook_is_error() {
        let mut stage = ShaderStage::parse(StageKind::Fragment, TEMPLATE).unwrap();
        assert!(stage.inject(HookPoint::FragmentNormal, "x").is_err());
        assert!(stage.inject(HookPoint::VertexProject, "x").is_err());
    }

    #[test]
    fn test_malformed_templates() {
        assert!(ShaderStage::parse(StageKind::Fragment, "// @hook fragment_map\n").is_err());
        assert!(ShaderStage::parse(StageKind::Fragment, "// @end\n").is_err());
        assert!(ShaderStage::parse(StageKind::Fragment, "// @hook nope\n// @end\n").is_err());
        assert!(ShaderStage::parse(StageKind::Vertex, "// @hook fragment_map\n// @end\n").is_err());
    }

    #[test]
    fn test_standard_stages_expose_every_hook() {
        let vertex = ShaderStage::standard_vertex().unwrap();
        let fragment = ShaderStage::standard_fragment().unwrap();
        for hook in HookPoint::ALL {
            match hook.stage() {
                StageKind::Vertex => assert!(vertex.has_hook(hook), "{hook:?}"),
                StageKind::Fragment => assert!(fragment.has_hook(hook), "{hook:?}"),
            }
        }
    }

    #[test]
    fn test_define_constants() {
        let mut defines = BTreeMap::new();
        defines.insert("USE_NORMAL".to_string(), true);
        defines.insert("TRANSPARENT".to_string(), false);
        assert_eq!(
            define_constants(&defines),
            "const TRANSPARENT: bool = false;\nconst USE_NORMAL: bool = true;\n"
        );
    }
}
