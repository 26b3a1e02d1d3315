//! WGSL shader sources
//!
//! Every program is embedded in the binary. A directory set with
//! [`ShaderLibrary::from_dir`] overrides individual programs: `<dir>/<name>.wgsl`
//! is used when it exists, the embedded source otherwise.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use crate::error::{RenderError, Result};

const BUILTIN: &[(&str, &str)] = &[
    ("shadow", include_str!("../shaders/shadow.wgsl")),
    ("geometry", include_str!("../shaders/geometry.wgsl")),
    ("ssao", include_str!("../shaders/ssao.wgsl")),
    ("blur", include_str!("../shaders/blur.wgsl")),
    ("stencil", include_str!("../shaders/stencil.wgsl")),
    ("lighting", include_str!("../shaders/lighting.wgsl")),
    ("capture", include_str!("../shaders/capture.wgsl")),
    ("skybox", include_str!("../shaders/skybox.wgsl")),
    ("baseline", include_str!("../shaders/baseline.wgsl")),
];

#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    override_dir: Option<PathBuf>,
}

impl ShaderLibrary {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(name, _)| *name)
    }

    /// Returns the WGSL source of program `name`.
    pub fn source(&self, name: &str) -> Result<Cow<'static, str>> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{name}.wgsl"));
            if path.exists() {
                log::info!("Using shader override {}", path.display());
                return read_source(&path).map(Cow::Owned);
            }
        }

        BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, source)| Cow::Borrowed(*source))
            .ok_or_else(|| RenderError::ShaderSource {
                path: PathBuf::from(format!("{name}.wgsl")),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such shader program"),
            })
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| RenderError::ShaderSource {
        path: path.to_owned(),
        source,
    })
}
