//! GLSL front-end: naga parse + validation, and reflection of the program
//! interface used for name-based uniform and attribute lookups.
//!
//! Everything here is device-free so the shader library can be checked
//! offline (`filterlab shaders check`) as well as at pipeline construction.

use std::collections::{BTreeMap, BTreeSet};

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::{AddressSpace, Binding, ScalarKind, ShaderStage, TypeInner, VectorSize};

use crate::error::{RenderError, StageKind};
use crate::library::{ProgramSpec, ShaderAsset, ShaderLibrary};

/// Descriptor set holding the program's uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Descriptor set holding texture/sampler pairs (texture at `2k`, sampler at
/// `2k + 1`).
pub const TEXTURE_GROUP: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: u32,
    pub kind: UniformKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub size: u32,
    pub members: BTreeMap<String, UniformMember>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
}

/// Reflected interface of a linked vertex + fragment pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub uniforms: Option<UniformBlock>,
    pub textures: Vec<TextureSlot>,
    pub attributes: BTreeMap<String, u32>,
}

impl ProgramInterface {
    pub fn uniform(&self, name: &str) -> Option<UniformMember> {
        self.uniforms
            .as_ref()
            .and_then(|block| block.members.get(name).copied())
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// Size of the uniform buffer to allocate, rounded to 16 bytes.
    pub fn uniform_buffer_size(&self) -> u64 {
        self.uniforms
            .as_ref()
            .map(|block| (u64::from(block.size) + 15) & !15)
            .unwrap_or(0)
    }
}

/// Parses and validates one stage.
pub fn parse_stage(label: &str, asset: &ShaderAsset) -> Result<naga::Module, RenderError> {
    let stage = match asset.stage {
        StageKind::Vertex => ShaderStage::Vertex,
        StageKind::Fragment => ShaderStage::Fragment,
    };
    let source = asset.source.as_ref();
    let compile_error = |log: String| RenderError::Compile {
        label: label.to_string(),
        stage: asset.stage,
        log,
    };

    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(stage), source)
        .map_err(|errors| compile_error(errors.emit_to_string(source)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(|err| compile_error(err.emit_to_string(source)))?;

    Ok(module)
}

/// Links two parsed stages: checks the varyings line up, merges their uniform
/// blocks, and collects texture slots and vertex attributes.
pub fn link_program(
    label: &str,
    vertex: &naga::Module,
    fragment: &naga::Module,
) -> Result<ProgramInterface, RenderError> {
    let link_error = |log: String| RenderError::Link {
        label: label.to_string(),
        log,
    };

    let vertex_outputs = output_locations(vertex, ShaderStage::Vertex);
    for (location, name) in input_locations(fragment, ShaderStage::Fragment) {
        if !vertex_outputs.contains(&location) {
            return Err(link_error(format!(
                "fragment input '{name}' at location {location} has no matching vertex output"
            )));
        }
    }

    let uniforms = match (uniform_block(vertex), uniform_block(fragment)) {
        (Some(vs), Some(fs)) => Some(merge_blocks(vs, fs).map_err(link_error)?),
        (Some(block), None) | (None, Some(block)) => Some(block),
        (None, None) => None,
    };

    let mut textures = texture_slots(vertex).map_err(link_error)?;
    for slot in texture_slots(fragment).map_err(link_error)? {
        if !textures.iter().any(|existing| existing.binding == slot.binding) {
            textures.push(slot);
        }
    }
    textures.sort_by_key(|slot| slot.binding);

    let attributes = input_locations(vertex, ShaderStage::Vertex)
        .into_iter()
        .map(|(location, name)| (name, location))
        .collect();

    Ok(ProgramInterface {
        uniforms,
        textures,
        attributes,
    })
}

/// Parses both stages of `spec` from `library` and links them.
pub fn check_program(
    library: &ShaderLibrary,
    spec: &ProgramSpec,
) -> Result<ProgramInterface, RenderError> {
    let vertex = parse_stage(spec.label, library.get(spec.vertex)?)?;
    let fragment = parse_stage(spec.label, library.get(spec.fragment)?)?;
    link_program(spec.label, &vertex, &fragment)
}

/// Runs [`check_program`] over every program the renderers use.
pub fn check_library(
    library: &ShaderLibrary,
) -> Vec<(ProgramSpec, Result<ProgramInterface, RenderError>)> {
    ProgramSpec::ALL
        .iter()
        .map(|spec| (*spec, check_program(library, spec)))
        .collect()
}

fn entry_point(module: &naga::Module, stage: ShaderStage) -> Option<&naga::EntryPoint> {
    module.entry_points.iter().find(|ep| ep.stage == stage)
}

fn input_locations(module: &naga::Module, stage: ShaderStage) -> Vec<(u32, String)> {
    let Some(ep) = entry_point(module, stage) else {
        return Vec::new();
    };
    ep.function
        .arguments
        .iter()
        .filter_map(|arg| match arg.binding {
            Some(Binding::Location { location, .. }) => Some((
                location,
                arg.name
                    .clone()
                    .unwrap_or_else(|| format!("location{location}")),
            )),
            _ => None,
        })
        .collect()
}

fn output_locations(module: &naga::Module, stage: ShaderStage) -> BTreeSet<u32> {
    let mut locations = BTreeSet::new();
    let Some(result) = entry_point(module, stage).and_then(|ep| ep.function.result.as_ref())
    else {
        return locations;
    };
    if let Some(Binding::Location { location, .. }) = result.binding {
        locations.insert(location);
    }
    if let TypeInner::Struct { members, .. } = &module.types[result.ty].inner {
        for member in members {
            if let Some(Binding::Location { location, .. }) = member.binding {
                locations.insert(location);
            }
        }
    }
    locations
}

fn uniform_block(module: &naga::Module) -> Option<UniformBlock> {
    module.global_variables.iter().find_map(|(_, var)| {
        let binding = var.binding.as_ref()?;
        if var.space != AddressSpace::Uniform
            || binding.group != UNIFORM_GROUP
            || binding.binding != 0
        {
            return None;
        }
        let ty = &module.types[var.ty];
        let TypeInner::Struct { members, span } = &ty.inner else {
            return None;
        };
        let members = members
            .iter()
            .filter_map(|member| {
                let name = member.name.clone()?;
                let kind = uniform_kind(&module.types[member.ty].inner);
                Some((
                    name,
                    UniformMember {
                        offset: member.offset,
                        kind,
                    },
                ))
            })
            .collect();
        Some(UniformBlock {
            name: ty
                .name
                .clone()
                .or_else(|| var.name.clone())
                .unwrap_or_else(|| "uniforms".to_string()),
            size: *span,
            members,
        })
    })
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Sint | ScalarKind::Uint => UniformKind::Int,
            ScalarKind::Float => UniformKind::Float,
            _ => UniformKind::Other,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => UniformKind::Vec2,
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}

fn merge_blocks(vertex: UniformBlock, fragment: UniformBlock) -> Result<UniformBlock, String> {
    let mut merged = vertex;
    for (name, member) in fragment.members {
        match merged.members.get(&name) {
            Some(existing) if *existing != member => {
                return Err(format!(
                    "uniform '{name}' is declared at offset {} in the vertex stage but {} in the fragment stage",
                    existing.offset, member.offset
                ));
            }
            Some(_) => {}
            None => {
                if let Some((other, _)) = merged
                    .members
                    .iter()
                    .find(|(_, existing)| existing.offset == member.offset)
                {
                    return Err(format!(
                        "uniforms '{other}' and '{name}' share offset {} across stages",
                        member.offset
                    ));
                }
                merged.members.insert(name, member);
            }
        }
    }
    merged.size = merged.size.max(fragment.size);
    Ok(merged)
}

fn texture_slots(module: &naga::Module) -> Result<Vec<TextureSlot>, String> {
    let mut textures = Vec::new();
    let mut samplers = BTreeSet::new();
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = var.binding.as_ref() else {
            continue;
        };
        if var.space != AddressSpace::Handle {
            continue;
        }
        let name = var
            .name
            .clone()
            .unwrap_or_else(|| format!("binding{}", binding.binding));
        match module.types[var.ty].inner {
            TypeInner::Image { .. } => {
                if binding.group != TEXTURE_GROUP || binding.binding % 2 != 0 {
                    return Err(format!(
                        "texture '{name}' must use set {TEXTURE_GROUP} at an even binding"
                    ));
                }
                textures.push(TextureSlot {
                    name,
                    binding: binding.binding,
                });
            }
            TypeInner::Sampler { .. } => {
                samplers.insert(binding.binding);
            }
            _ => {}
        }
    }

    for slot in &textures {
        if !samplers.contains(&(slot.binding + 1)) {
            return Err(format!(
                "texture '{}' at binding {} has no sampler at binding {}",
                slot.name,
                slot.binding,
                slot.binding + 1
            ));
        }
    }
    Ok(textures)
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::library::ShaderOrigin;

    fn asset(name: &str, stage: StageKind, source: &'static str) -> ShaderAsset {
        ShaderAsset {
            name: name.to_string(),
            stage,
            origin: ShaderOrigin::Builtin { revision: 0 },
            source: Cow::Borrowed(source),
        }
    }

    #[test]
    fn builtin_programs_all_pass_validation() {
        let library = ShaderLibrary::builtin();
        for (spec, result) in check_library(&library) {
            if let Err(err) = result {
                panic!("program {} failed: {err}", spec.label);
            }
        }
    }

    #[test]
    fn filter_program_reflects_uniforms_and_attributes() {
        let library = ShaderLibrary::builtin();
        let interface = check_program(&library, &ProgramSpec::FILTER).unwrap();

        let texel = interface.uniform("u_texel_size").unwrap();
        assert_eq!(texel.offset, 0);
        assert_eq!(texel.kind, UniformKind::Vec2);
        let kind = interface.uniform("u_filter_kind").unwrap();
        assert_eq!(kind.offset, 8);
        assert_eq!(kind.kind, UniformKind::Int);
        assert_eq!(interface.uniform("u_missing"), None);

        assert_eq!(interface.attribute("a_position"), Some(0));
        assert_eq!(interface.attribute("a_tex_coord"), Some(1));
        assert_eq!(interface.attribute("a_normal"), None);

        assert_eq!(interface.textures.len(), 1);
        assert_eq!(interface.textures[0].binding, 0);
        assert_eq!(interface.uniform_buffer_size(), 16);
    }

    #[test]
    fn lut_program_shares_its_block_across_stages() {
        let library = ShaderLibrary::builtin();
        let interface = check_program(&library, &ProgramSpec::LUT).unwrap();
        assert_eq!(
            interface.uniform("u_tex_transform").map(|m| m.kind),
            Some(UniformKind::Mat4)
        );
        assert_eq!(interface.uniform("u_intensity").map(|m| m.offset), Some(64));
        let bindings: Vec<u32> = interface.textures.iter().map(|t| t.binding).collect();
        assert_eq!(bindings, vec![0, 2]);
    }

    #[test]
    fn passthrough_has_no_uniform_block() {
        let library = ShaderLibrary::builtin();
        let interface = check_program(&library, &ProgramSpec::PASSTHROUGH).unwrap();
        assert!(interface.uniforms.is_none());
        assert_eq!(interface.uniform_buffer_size(), 0);
    }

    #[test]
    fn syntax_errors_report_compile_diagnostics() {
        let broken = asset(
            "broken.frag",
            StageKind::Fragment,
            "#version 450\nlayout(location = 0) out vec4 out_color;\nvoid main() { out_color = vec4(1.0) }\n",
        );
        let err = parse_stage("broken", &broken).unwrap_err();
        match err {
            RenderError::Compile { label, stage, log } => {
                assert_eq!(label, "broken");
                assert_eq!(stage, StageKind::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatched_varyings_fail_to_link() {
        let vertex = asset(
            "v.vert",
            StageKind::Vertex,
            "#version 450\nlayout(location = 0) in vec3 a_position;\nvoid main() { gl_Position = vec4(a_position, 1.0); }\n",
        );
        let fragment = asset(
            "f.frag",
            StageKind::Fragment,
            "#version 450\nlayout(location = 0) in vec2 v_tex_coord;\nlayout(location = 0) out vec4 out_color;\nvoid main() { out_color = vec4(v_tex_coord, 0.0, 1.0); }\n",
        );
        let vs = parse_stage("pair", &vertex).unwrap();
        let fs = parse_stage("pair", &fragment).unwrap();
        let err = link_program("pair", &vs, &fs).unwrap_err();
        assert!(matches!(err, RenderError::Link { .. }));
        assert!(err.to_string().contains("location 0"));
    }

    #[test]
    fn textures_without_samplers_fail_to_link() {
        let vertex = asset(
            "quad.vert",
            StageKind::Vertex,
            include_str!("../shaders/quad.vert"),
        );
        let fragment = asset(
            "lonely.frag",
            StageKind::Fragment,
            "#version 450\nlayout(location = 0) in vec2 v_tex_coord;\nlayout(location = 0) out vec4 out_color;\nlayout(set = 1, binding = 0) uniform texture2D u_texture;\nlayout(set = 1, binding = 3) uniform sampler u_other;\nvoid main() { out_color = texture(sampler2D(u_texture, u_other), v_tex_coord); }\n",
        );
        let vs = parse_stage("lonely", &vertex).unwrap();
        let fs = parse_stage("lonely", &fragment).unwrap();
        let err = link_program("lonely", &vs, &fs).unwrap_err();
        assert!(err.to_string().contains("no sampler at binding 1"));
    }
}
