//! GLSL sources as named, revisioned resources.
//!
//! The built-in sources live in `crates/renderer/shaders/` and are embedded at
//! build time. A library may be layered with an override directory so shader
//! edits can be tried without rebuilding; files there replace built-ins with
//! the same name.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RenderError, StageKind};

struct BuiltinShader {
    name: &'static str,
    revision: u32,
    source: &'static str,
}

const BUILTIN_SHADERS: &[BuiltinShader] = &[
    BuiltinShader {
        name: "quad.vert",
        revision: 1,
        source: include_str!("../shaders/quad.vert"),
    },
    BuiltinShader {
        name: "spin.vert",
        revision: 1,
        source: include_str!("../shaders/spin.vert"),
    },
    BuiltinShader {
        name: "lut.vert",
        revision: 2,
        source: include_str!("../shaders/lut.vert"),
    },
    BuiltinShader {
        name: "passthrough.frag",
        revision: 1,
        source: include_str!("../shaders/passthrough.frag"),
    },
    BuiltinShader {
        name: "filter.frag",
        revision: 3,
        source: include_str!("../shaders/filter.frag"),
    },
    BuiltinShader {
        name: "blend.frag",
        revision: 2,
        source: include_str!("../shaders/blend.frag"),
    },
    BuiltinShader {
        name: "lut.frag",
        revision: 2,
        source: include_str!("../shaders/lut.frag"),
    },
];

/// A vertex/fragment pairing drawn from the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramSpec {
    pub label: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

impl ProgramSpec {
    pub const PASSTHROUGH: ProgramSpec = ProgramSpec {
        label: "passthrough",
        vertex: "quad.vert",
        fragment: "passthrough.frag",
    };
    pub const FILTER: ProgramSpec = ProgramSpec {
        label: "filter",
        vertex: "quad.vert",
        fragment: "filter.frag",
    };
    pub const BLEND: ProgramSpec = ProgramSpec {
        label: "blend",
        vertex: "quad.vert",
        fragment: "blend.frag",
    };
    pub const LUT: ProgramSpec = ProgramSpec {
        label: "lut",
        vertex: "lut.vert",
        fragment: "lut.frag",
    };
    pub const SPIN: ProgramSpec = ProgramSpec {
        label: "spin",
        vertex: "spin.vert",
        fragment: "passthrough.frag",
    };

    pub const ALL: [ProgramSpec; 5] = [
        ProgramSpec::PASSTHROUGH,
        ProgramSpec::FILTER,
        ProgramSpec::BLEND,
        ProgramSpec::LUT,
        ProgramSpec::SPIN,
    ];
}

/// Where a library entry came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShaderOrigin {
    Builtin { revision: u32 },
    Override { path: PathBuf },
}

#[derive(Clone, Debug)]
pub struct ShaderAsset {
    pub name: String,
    pub stage: StageKind,
    pub origin: ShaderOrigin,
    pub source: Cow<'static, str>,
}

#[derive(Clone, Debug)]
pub struct ShaderLibrary {
    assets: BTreeMap<String, ShaderAsset>,
}

impl ShaderLibrary {
    /// Library containing only the embedded sources.
    pub fn builtin() -> Self {
        let mut assets = BTreeMap::new();
        for shader in BUILTIN_SHADERS {
            // Built-in names all carry a known extension.
            let Some(stage) = stage_for_name(shader.name) else {
                continue;
            };
            assets.insert(
                shader.name.to_string(),
                ShaderAsset {
                    name: shader.name.to_string(),
                    stage,
                    origin: ShaderOrigin::Builtin {
                        revision: shader.revision,
                    },
                    source: Cow::Borrowed(shader.source),
                },
            );
        }
        Self { assets }
    }

    /// Layers `.vert`/`.frag` files found in `dir` over the current entries.
    pub fn with_overrides(mut self, dir: &Path) -> Result<Self, RenderError> {
        let entries = fs::read_dir(dir).map_err(|source| RenderError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| RenderError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some(stage) = stage_for_name(name) else {
                tracing::debug!(path = %path.display(), "skipping non-shader file in override dir");
                continue;
            };
            let source = fs::read_to_string(&path).map_err(|source| RenderError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::info!(shader = name, path = %path.display(), "using shader override");
            self.assets.insert(
                name.to_string(),
                ShaderAsset {
                    name: name.to_string(),
                    stage,
                    origin: ShaderOrigin::Override { path },
                    source: Cow::Owned(source),
                },
            );
        }

        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&ShaderAsset, RenderError> {
        self.assets
            .get(name)
            .ok_or_else(|| RenderError::MissingShader(name.to_string()))
    }

    pub fn assets(&self) -> impl Iterator<Item = &ShaderAsset> {
        self.assets.values()
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn stage_for_name(name: &str) -> Option<StageKind> {
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some("vert") => Some(StageKind::Vertex),
        Some("frag") => Some(StageKind::Fragment),
        _ => None,
    }
}
