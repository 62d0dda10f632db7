use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "wasp.toml";
pub const DEFAULT_MODULE: &str = "wasp";
pub const DEFAULT_TRAP_HANDLER: &str = "wasm_trap";

/// Settings read from `wasp.toml`. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WaspManifest {
    pub path: Option<PathBuf>,
    pub build: BuildSection,
    pub runtime: RuntimeSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    pub module: String,
    pub target: Option<String>,
    pub output: Option<PathBuf>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            module: DEFAULT_MODULE.to_string(),
            target: None,
            output: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    /// External function called with the trap message before `unreachable`.
    pub trap_handler: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            trap_handler: DEFAULT_TRAP_HANDLER.to_string(),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawManifest {
    build: BuildSection,
    runtime: RuntimeSection,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("invalid manifest {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid manifest {}: `{key}` {message}", path.display())]
    Invalid {
        path: PathBuf,
        key: &'static str,
        message: String,
    },
}

impl WaspManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|error| ManifestError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(content).map_err(|error| ManifestError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        let invalid = |key, message: &str| ManifestError::Invalid {
            path: path.to_path_buf(),
            key,
            message: message.to_string(),
        };
        if !is_symbol(&raw.build.module) {
            return Err(invalid("build.module", "must be a non-empty symbol name"));
        }
        if !is_symbol(&raw.runtime.trap_handler) {
            return Err(invalid(
                "runtime.trap_handler",
                "must be a non-empty symbol name",
            ));
        }
        if raw
            .build
            .target
            .as_deref()
            .is_some_and(|target| target.trim().is_empty())
        {
            return Err(invalid("build.target", "must not be empty"));
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            build: raw.build,
            runtime: raw.runtime,
        })
    }

    /// Uses `explicit` when given, else the nearest `wasp.toml` above
    /// `script`, else the defaults.
    pub fn resolve(explicit: Option<&Path>, script: Option<&Path>) -> Result<Self, ManifestError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match script.and_then(find_manifest) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// `build.output`, relative to the manifest directory.
    pub fn output_path(&self) -> Option<PathBuf> {
        let output = self.build.output.as_ref()?;
        Some(match self.root() {
            Some(root) if output.is_relative() => root.join(output),
            _ => output.clone(),
        })
    }
}

fn is_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

pub fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_dir() {
        start.to_path_buf()
    } else {
        start
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };
    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}
