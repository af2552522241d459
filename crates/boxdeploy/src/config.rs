//! Deployment options, usually read from a TOML file.
//!
//! ```toml
//! wait_for_install = false
//! wasm_base_url = "https://cdn.example.org/box/"
//! wasm_path = "box.wasm"
//! ```
//!
//! The camel-case spellings (`waitForInstall`, `wasmBaseUrl`, ...) are
//! accepted as well.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

use crate::wasm;
use crate::wasm::WasmSource;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Await code installation before `create` returns.
    #[serde(alias = "waitForInstall")]
    pub wait_for_install: bool,
    /// Location the module is served from.
    #[serde(alias = "wasmBaseUrl")]
    pub wasm_base_url: Option<Url>,
    /// Module path, relative to `wasm_base_url`.
    #[serde(alias = "wasmPath")]
    pub wasm_path: String,
    /// Local module file. Takes precedence over the URL.
    #[serde(alias = "wasmFile")]
    pub wasm_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wait_for_install: true,
            wasm_base_url: None,
            wasm_path: "box.wasm".to_string(),
            wasm_file: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Failed to read config: {}", msg),
            Self::Parse(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// The configured module source, if any.
    pub fn wasm_source(&self) -> wasm::Result<Option<WasmSource>> {
        if let Some(file) = &self.wasm_file {
            return Ok(Some(WasmSource::File(file.clone())));
        }
        match &self.wasm_base_url {
            Some(base) => WasmSource::relative(base, &self.wasm_path).map(Some),
            None => Ok(None),
        }
    }
}
