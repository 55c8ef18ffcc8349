// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader stages and where they come from.

Shader compilation is not this crate's concern.  A [`Shader`] is either WGSL source, which
the wgpu backend compiles, or opaque precompiled bytecode, which is passed through untouched.
[`ShaderLoader`] is the seam to whatever produces them.

```
use batches_and_passes::shader::{Shader, ShaderLibrary, ShaderLoader};
let mut library = ShaderLibrary::new();
library.insert("color.frag", Shader::wgsl("color.frag", "@fragment fn main() {}"));
let shader = library.load("color.frag").unwrap();
assert_eq!(shader.entry_point(), "main");
assert!(library.load("missing.frag").is_err());
```
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStageKind {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
}

impl ShaderStageKind {
    pub const ALL: [ShaderStageKind; 5] = [
        ShaderStageKind::Vertex,
        ShaderStageKind::TessellationControl,
        ShaderStageKind::TessellationEvaluation,
        ShaderStageKind::Geometry,
        ShaderStageKind::Fragment,
    ];

    pub fn is_tessellation(self) -> bool {
        matches!(
            self,
            ShaderStageKind::TessellationControl | ShaderStageKind::TessellationEvaluation
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCode {
    Wgsl(String),
    /// Precompiled, backend-specific bytecode.
    Bytecode(Arc<[u8]>),
}

/// Compiled or compilable code for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    label: String,
    code: ShaderCode,
    entry_point: String,
}

impl Shader {
    pub fn wgsl(label: &str, source: &str) -> Shader {
        Shader {
            label: label.to_string(),
            code: ShaderCode::Wgsl(source.to_string()),
            entry_point: "main".to_string(),
        }
    }

    pub fn bytecode(label: &str, bytes: impl Into<Arc<[u8]>>) -> Shader {
        Shader {
            label: label.to_string(),
            code: ShaderCode::Bytecode(bytes.into()),
            entry_point: "main".to_string(),
        }
    }

    /// Entry points default to `main`.
    pub fn with_entry_point(mut self, entry_point: &str) -> Shader {
        self.entry_point = entry_point.to_string();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn code(&self) -> &ShaderCode {
        &self.code
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// A shader bound to the stage it runs in.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStage {
    pub kind: ShaderStageKind,
    pub shader: Shader,
}

impl ShaderStage {
    pub fn new(kind: ShaderStageKind, shader: Shader) -> ShaderStage {
        ShaderStage { kind, shader }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShaderLoadError {
    #[error("no shader at {0}")]
    NotFound(String),
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("WGSL shader {0} is not valid UTF-8")]
    InvalidUtf8(String),
}

/// Produces shaders by path.
pub trait ShaderLoader {
    fn load(&self, path: &str) -> Result<Shader, ShaderLoadError>;
}

/// Shaders held in memory.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    shaders: HashMap<String, Shader>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, shader: Shader) {
        self.shaders.insert(path.to_string(), shader);
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

impl ShaderLoader for ShaderLibrary {
    fn load(&self, path: &str) -> Result<Shader, ShaderLoadError> {
        self.shaders
            .get(path)
            .cloned()
            .ok_or_else(|| ShaderLoadError::NotFound(path.to_string()))
    }
}

/// Loads shaders from files under a root directory.
///
/// Files ending in `.wgsl` load as WGSL source; anything else loads as bytecode.
#[derive(Debug, Clone)]
pub struct DirectoryShaderLoader {
    root: PathBuf,
}

impl DirectoryShaderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryShaderLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderLoader for DirectoryShaderLoader {
    fn load(&self, path: &str) -> Result<Shader, ShaderLoadError> {
        let full = self.root.join(path);
        let bytes = std::fs::read(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ShaderLoadError::NotFound(path.to_string())
            } else {
                ShaderLoadError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })?;
        if full.extension().is_some_and(|e| e == "wgsl") {
            let source =
                String::from_utf8(bytes).map_err(|_| ShaderLoadError::InvalidUtf8(path.to_string()))?;
            Ok(Shader {
                label: path.to_string(),
                code: ShaderCode::Wgsl(source),
                entry_point: "main".to_string(),
            })
        } else {
            Ok(Shader::bytecode(path, bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_loader_distinguishes_wgsl() {
        let dir = std::env::temp_dir().join(format!("bap_shaders_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.wgsl"), "@vertex fn main() {}").unwrap();
        std::fs::write(dir.join("a.vert.qsb"), [0u8, 1, 2, 3]).unwrap();

        let loader = DirectoryShaderLoader::new(&dir);
        let wgsl = loader.load("a.wgsl").unwrap();
        assert!(matches!(wgsl.code(), ShaderCode::Wgsl(s) if s.starts_with("@vertex")));
        let qsb = loader.load("a.vert.qsb").unwrap();
        assert!(matches!(qsb.code(), ShaderCode::Bytecode(b) if b.len() == 4));
        assert!(matches!(
            loader.load("nope.wgsl"),
            Err(ShaderLoadError::NotFound(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
