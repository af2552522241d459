//! # Canister handles
//!
//! A `CanisterHandle` is the result of a deployment: the canister's textual
//! id next to a bound service proxy. The handle dereferences to the service,
//! so its methods are called directly on the handle.
//!
//! ## Invariants
//!
//! - `id` is always the canonical textual form of the principal the service
//!   is bound to. Text input is parsed case-insensitively, so `"AAAAA-AA"`
//!   yields the id `"aaaaa-aa"`.
//! - Building a handle never talks to the network.

use std::ops::Deref;
use std::sync::Arc;

use canister::Agent;
use canister::InstallMode;
use canister::Principal;
use canister::PrincipalError;
use canister::Service;
use canister::agent;
use tokio::task::JoinHandle;

use crate::deploy::DeployError;

/// An address given either parsed or in textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanisterRef {
    Principal(Principal),
    Text(String),
}

impl CanisterRef {
    pub fn resolve(self) -> Result<Principal, PrincipalError> {
        match self {
            Self::Principal(principal) => Ok(principal),
            Self::Text(text) => Principal::from_text(&text),
        }
    }
}

impl From<Principal> for CanisterRef {
    fn from(principal: Principal) -> Self {
        Self::Principal(principal)
    }
}

impl From<&Principal> for CanisterRef {
    fn from(principal: &Principal) -> Self {
        Self::Principal(principal.clone())
    }
}

impl From<&str> for CanisterRef {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CanisterRef {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Code installation running in the background.
///
/// The task keeps running if the `InstallTask` is dropped; its outcome is
/// then only visible in the logs.
#[derive(Debug)]
pub struct InstallTask {
    canister: Principal,
    task: JoinHandle<agent::Result<()>>,
}

impl InstallTask {
    pub(crate) fn spawn(agent: Arc<dyn Agent>, canister: Principal, module: Arc<[u8]>) -> Self {
        let task = tokio::spawn({
            let canister = canister.clone();
            async move {
                tracing::debug!(%canister, bytes = module.len(), "installing code");
                let result = agent
                    .install_code(&canister, &module, InstallMode::Install)
                    .await;
                match &result {
                    Ok(()) => tracing::info!(%canister, "code installed"),
                    Err(e) => tracing::error!(%canister, error = %e, "code installation failed"),
                }
                result
            }
        });

        Self { canister, task }
    }

    pub fn canister(&self) -> &Principal {
        &self.canister
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the installation and returns the agent's result unchanged.
    pub async fn wait(self) -> Result<(), DeployError> {
        match self.task.await {
            Ok(result) => result.map_err(DeployError::Agent),
            Err(e) => Err(DeployError::InstallAborted(e.to_string())),
        }
    }
}

pub struct CanisterHandle<S> {
    /// Canonical (lowercase) textual canister id.
    pub id: String,
    principal: Principal,
    service: S,
    install: Option<InstallTask>,
}

impl<S: Service> CanisterHandle<S> {
    /// Binds a handle to an existing canister.
    ///
    /// The handle's `id` is the normalised form of `target`, not the string
    /// passed in.
    pub fn connect(agent: Arc<dyn Agent>, target: impl Into<CanisterRef>) -> Result<Self, DeployError> {
        let principal = target.into().resolve()?;
        tracing::debug!(canister = %principal, "connecting to canister");
        let service = S::bind(agent, principal.clone());
        Ok(Self::new(principal, service, None))
    }
}

impl<S> CanisterHandle<S> {
    pub(crate) fn new(principal: Principal, service: S, install: Option<InstallTask>) -> Self {
        Self {
            id: principal.to_text(),
            principal,
            service,
            install,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn into_service(self) -> S {
        self.service
    }

    /// True while a background installation has not finished.
    pub fn is_install_pending(&self) -> bool {
        self.install.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits for a background installation, if there is one.
    ///
    /// The outcome is reported once; later calls return `Ok(())`.
    pub async fn wait_installed(&mut self) -> Result<(), DeployError> {
        match self.install.take() {
            Some(task) => task.wait().await,
            None => Ok(()),
        }
    }
}

impl<S> Deref for CanisterHandle<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.service
    }
}

impl<S> std::fmt::Debug for CanisterHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanisterHandle")
            .field("id", &self.id)
            .field("install_pending", &self.is_install_pending())
            .finish()
    }
}
