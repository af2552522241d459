//! # Box deployment
//!
//! Provisions new box canisters and connects to existing ones.
//!
//! `Deployer::create` allocates a canister, installs the box wasm module into
//! it and returns a typed handle; `Deployer::connect` binds a handle to an
//! address that already hosts the module. The module is fetched once per
//! `WasmLoader` and shared by every deployment that uses that loader.

pub mod config;
pub mod deploy;
pub mod handle;
pub mod wasm;

pub use config::Config;
pub use config::ConfigError;
pub use deploy::DeployError;
pub use deploy::Deployer;
pub use deploy::DeployerBuilder;
pub use handle::CanisterHandle;
pub use handle::CanisterRef;
pub use handle::InstallTask;
pub use wasm::FETCH_FAILED;
pub use wasm::WasmError;
pub use wasm::WasmLoader;
pub use wasm::WasmSource;

/// Deployer for the box file-system canister.
pub type BoxDeployer = Deployer<boxfs::BoxFs>;
