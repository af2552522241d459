//! # Wasm module sources
//!
//! Where the box module comes from, and the lazily-fetched, shared copy of it.
//!
//! A failed fetch is not remembered: the loader clears its in-flight slot and
//! the next deployment fetches again.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use lazyload::Lazy;
use url::Url;

/// Message of a fetch that got a non-success HTTP status.
pub const FETCH_FAILED: &str = "Failed to fetch wasm module";

const WASM_MAGIC: &[u8] = b"\0asm";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WasmError {
    /// The server answered with a non-success status.
    Status(u16),
    /// The request could not be completed.
    Http(String),
    Io(String),
    Url(url::ParseError),
    /// The bytes are not a wasm module.
    NotWasm,
}

impl fmt::Display for WasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(_) => f.write_str(FETCH_FAILED),
            Self::Http(msg) => write!(f, "HTTP error: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Url(e) => write!(f, "Invalid wasm module URL: {}", e),
            Self::NotWasm => write!(f, "Fetched bytes are not a wasm module"),
        }
    }
}

impl std::error::Error for WasmError {}

pub type Result<T> = std::result::Result<T, WasmError>;

/// The fetched module, shared by every deployment that uses the loader.
pub type WasmLoader = Lazy<Arc<[u8]>, WasmError>;

#[derive(Debug, Clone)]
pub enum WasmSource {
    /// `http(s)://` or `file://` URL.
    Url(Url),
    File(PathBuf),
    /// Module bytes already in memory.
    Bytes(Arc<[u8]>),
}

impl WasmSource {
    /// Resolves `path` against `base`, the location the module is served from.
    pub fn relative(base: &Url, path: &str) -> Result<Self> {
        base.join(path).map(Self::Url).map_err(WasmError::Url)
    }

    pub fn bytes(module: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(module.into())
    }

    /// Fetches the module and checks its wasm header.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Arc<[u8]>> {
        let module: Arc<[u8]> = match self {
            Self::Url(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| WasmError::Io(format!("not a local path: {}", url)))?;
                read_file(&path).await?
            }
            Self::Url(url) => {
                let response = client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| WasmError::Http(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    tracing::warn!(%url, %status, "wasm module fetch rejected");
                    return Err(WasmError::Status(status.as_u16()));
                }

                let body = response
                    .bytes()
                    .await
                    .map_err(|e| WasmError::Http(e.to_string()))?;
                Arc::from(&body[..])
            }
            Self::File(path) => read_file(path).await?,
            Self::Bytes(module) => module.clone(),
        };

        if !module.starts_with(WASM_MAGIC) {
            return Err(WasmError::NotWasm);
        }
        Ok(module)
    }
}

impl fmt::Display for WasmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Bytes(module) => write!(f, "<{} bytes in memory>", module.len()),
        }
    }
}

async fn read_file(path: &std::path::Path) -> Result<Arc<[u8]>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| WasmError::Io(format!("{}: {}", path.display(), e)))?;
    Ok(Arc::from(bytes))
}

/// Creates a loader that fetches from `source` on first use.
pub fn loader(source: WasmSource, client: reqwest::Client) -> WasmLoader {
    let source = Arc::new(source);
    Lazy::new(move || {
        let source = source.clone();
        let client = client.clone();
        async move {
            tracing::debug!(%source, "fetching wasm module");
            let module = source.fetch(&client).await?;
            tracing::info!(%source, bytes = module.len(), "fetched wasm module");
            Ok(module)
        }
    })
}
