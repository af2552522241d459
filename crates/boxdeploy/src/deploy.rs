//! # Deployer
//!
//! Provisions canisters for a service type `S`.
//!
//! `create` runs these steps in order:
//!
//! 1. allocate an empty canister,
//! 2. obtain the module bytes from the shared loader,
//! 3. start installing them into the canister,
//! 4. wait for the installation if `wait_for_install` is set,
//! 5. bind the service to the new address.
//!
//! Every failure is returned to the caller as raised. Nothing is retried here
//! and a canister allocated before a failure is not cleaned up.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use canister::Agent;
use canister::AgentError;
use canister::PrincipalError;
use canister::Service;

use crate::config::Config;
use crate::handle::CanisterHandle;
use crate::handle::CanisterRef;
use crate::handle::InstallTask;
use crate::wasm;
use crate::wasm::WasmError;
use crate::wasm::WasmLoader;
use crate::wasm::WasmSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// Raised by the agent. Displayed unchanged.
    Agent(AgentError),
    /// The module could not be obtained.
    Wasm(lazyload::Error<WasmError>),
    /// The canister id passed to `connect` is malformed.
    Principal(PrincipalError),
    /// The installation task was cancelled before finishing.
    InstallAborted(String),
    Config(String),
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(e) => write!(f, "{}", e),
            Self::Wasm(e) => write!(f, "{}", e),
            Self::Principal(e) => write!(f, "Invalid canister id: {}", e),
            Self::InstallAborted(msg) => write!(f, "Install task aborted: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DeployError {}

impl From<AgentError> for DeployError {
    fn from(e: AgentError) -> Self {
        Self::Agent(e)
    }
}

impl From<lazyload::Error<WasmError>> for DeployError {
    fn from(e: lazyload::Error<WasmError>) -> Self {
        Self::Wasm(e)
    }
}

impl From<PrincipalError> for DeployError {
    fn from(e: PrincipalError) -> Self {
        Self::Principal(e)
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

pub struct Deployer<S> {
    agent: Arc<dyn Agent>,
    wasm: Arc<WasmLoader>,
    wait_for_install: bool,
    _service: PhantomData<fn() -> S>,
}

impl<S> Clone for Deployer<S> {
    fn clone(&self) -> Self {
        Self {
            agent: self.agent.clone(),
            wasm: self.wasm.clone(),
            wait_for_install: self.wait_for_install,
            _service: PhantomData,
        }
    }
}

impl<S: Service> Deployer<S> {
    pub fn builder(agent: Arc<dyn Agent>) -> DeployerBuilder<S> {
        DeployerBuilder {
            agent,
            config: Config::default(),
            source: None,
            loader: None,
            client: None,
            _service: PhantomData,
        }
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// The loader this deployer takes its module from.
    pub fn wasm_loader(&self) -> &Arc<WasmLoader> {
        &self.wasm
    }

    pub fn waits_for_install(&self) -> bool {
        self.wait_for_install
    }

    /// Allocates a canister, installs the module into it and binds `S` to it.
    pub async fn create(&self) -> Result<CanisterHandle<S>> {
        let canister = self.agent.create_canister().await?;
        tracing::info!(%canister, "allocated canister");

        let module = self.wasm.get().await?;
        let install = InstallTask::spawn(self.agent.clone(), canister.clone(), module);

        let install = if self.wait_for_install {
            install.wait().await?;
            None
        } else {
            tracing::debug!(%canister, "not waiting for code installation");
            Some(install)
        };

        let service = S::bind(self.agent.clone(), canister.clone());
        Ok(CanisterHandle::new(canister, service, install))
    }

    /// Binds `S` to an existing canister. No network traffic.
    pub fn connect(&self, target: impl Into<CanisterRef>) -> Result<CanisterHandle<S>> {
        CanisterHandle::connect(self.agent.clone(), target)
    }
}

/// Builds a [`Deployer`].
///
/// The module comes from, in order of precedence: an explicit loader, an
/// explicit source, or the source named by the config.
pub struct DeployerBuilder<S> {
    agent: Arc<dyn Agent>,
    config: Config,
    source: Option<WasmSource>,
    loader: Option<Arc<WasmLoader>>,
    client: Option<reqwest::Client>,
    _service: PhantomData<fn() -> S>,
}

impl<S: Service> DeployerBuilder<S> {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn wait_for_install(mut self, wait: bool) -> Self {
        self.config.wait_for_install = wait;
        self
    }

    pub fn wasm_source(mut self, source: WasmSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Shares an existing loader, so deployers fetch the module at most once
    /// between them.
    pub fn wasm_loader(mut self, loader: Arc<WasmLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<Deployer<S>> {
        let wasm = match self.loader {
            Some(loader) => loader,
            None => {
                let source = match self.source {
                    Some(source) => source,
                    None => self
                        .config
                        .wasm_source()
                        .map_err(|e| DeployError::Config(e.to_string()))?
                        .ok_or_else(|| DeployError::Config("no wasm module source configured".to_string()))?,
                };
                let client = match self.client {
                    Some(client) => client,
                    None => reqwest::Client::builder()
                        .build()
                        .map_err(|e| DeployError::Config(e.to_string()))?,
                };
                Arc::new(wasm::loader(source, client))
            }
        };

        Ok(Deployer {
            agent: self.agent,
            wasm,
            wait_for_install: self.config.wait_for_install,
            _service: PhantomData,
        })
    }
}
