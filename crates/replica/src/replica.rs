//! # Local Replica
//!
//! An in-process `Agent` that plays the platform's part: it allocates
//! canister addresses, accepts code installs, and routes calls.
//!
//! Installed wasm is validated but not executed. Instead each module is tied,
//! by the sha-256 of its bytes, to a native implementation registered up
//! front; installing the module instantiates that implementation.
//!
//! `Install` needs an empty canister. `Reinstall` starts over with empty state.
//! `Upgrade` needs installed code and moves its snapshot into the new instance.
//!
//! Uses DashMap so that concurrent provisioning and calls never contend on a
//! global lock. No registry guard is held across an await.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use canister::Agent;
use canister::AgentError;
use canister::AnonymousIdentity;
use canister::Identity;
use canister::InstallMode;
use canister::Mode;
use canister::Principal;
use canister::RejectCode;
use canister::Value;
use canister::agent;
use dashmap::DashMap;
use sha2::Digest;
use sha2::Sha256;
use wasmtime::Engine;

use crate::native::Factory;
use crate::native::NativeCanister;

#[derive(Clone)]
struct Installed {
    module_hash: String,
    instance: Arc<dyn NativeCanister>,
}

struct CanisterState {
    controller: Principal,
    installed: Option<Installed>,
}

/// In-process platform hosting native canisters.
pub struct LocalReplica {
    engine: Engine,
    sender: Principal,
    modules: DashMap<String, Factory>,
    canisters: DashMap<Principal, CanisterState>,
    next_canister: AtomicU64,
}

impl LocalReplica {
    /// Creates a replica whose requests are sent anonymously.
    pub fn new() -> Self {
        Self::with_identity(AnonymousIdentity)
    }

    /// Creates a replica whose requests are sent as `identity`.
    pub fn with_identity(identity: impl Identity) -> Self {
        Self {
            engine: Engine::default(),
            sender: identity.sender(),
            modules: DashMap::new(),
            canisters: DashMap::new(),
            next_canister: AtomicU64::new(0),
        }
    }

    /// The principal this replica's requests are sent as.
    pub fn sender(&self) -> &Principal {
        &self.sender
    }

    /// Ties `module` to a native implementation and returns the module hash.
    ///
    /// Registering the same module again replaces the factory; canisters that
    /// already run it keep their instance.
    pub fn register_module<F>(&self, module: &[u8], factory: F) -> String
    where
        F: Fn() -> Arc<dyn NativeCanister> + Send + Sync + 'static,
    {
        let hash = module_hash(module);
        tracing::debug!(module_hash = %hash, "registered native module");
        self.modules.insert(hash.clone(), Arc::new(factory));
        hash
    }

    /// Hash of the module installed in `canister`, if any.
    pub fn module_hash(&self, canister: &Principal) -> Option<String> {
        self.canisters
            .get(canister)
            .and_then(|entry| entry.installed.as_ref().map(|i| i.module_hash.clone()))
    }

    /// The principal that created `canister`.
    pub fn controller(&self, canister: &Principal) -> Option<Principal> {
        self.canisters.get(canister).map(|entry| entry.controller.clone())
    }

    pub fn canister_count(&self) -> usize {
        self.canisters.len()
    }

    fn instance(&self, canister: &Principal) -> agent::Result<Arc<dyn NativeCanister>> {
        let entry = self
            .canisters
            .get(canister)
            .ok_or_else(|| not_found(canister))?;

        entry
            .installed
            .as_ref()
            .map(|installed| installed.instance.clone())
            .ok_or_else(|| {
                AgentError::rejected(
                    RejectCode::CanisterError,
                    format!("Canister {} has no installed code", canister),
                )
            })
    }

    async fn dispatch(
        &self,
        canister: &Principal,
        method: &str,
        mode: Mode,
        args: &[Value],
    ) -> agent::Result<Vec<Value>> {
        let instance = self.instance(canister)?;

        instance
            .handle(method, mode, args.to_vec())
            .await
            .map_err(|e| {
                tracing::debug!(canister = %canister, method, error = %e, "canister trapped");
                AgentError::rejected(RejectCode::CanisterError, format!("{:#}", e))
            })
    }
}

impl Default for LocalReplica {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Agent for LocalReplica {
    async fn create_canister(&self) -> agent::Result<Principal> {
        let index = self.next_canister.fetch_add(1, Ordering::Relaxed);
        let id = Principal::from_canister_index(index);

        self.canisters.insert(
            id.clone(),
            CanisterState {
                controller: self.sender.clone(),
                installed: None,
            },
        );

        tracing::info!(canister = %id, controller = %self.sender, "created canister");
        Ok(id)
    }

    async fn install_code(&self, canister: &Principal, module: &[u8], mode: InstallMode) -> agent::Result<()> {
        wasmtime::Module::validate(&self.engine, module).map_err(|e| {
            AgentError::rejected(RejectCode::CanisterError, format!("Invalid wasm module: {}", e))
        })?;

        let hash = module_hash(module);
        let factory = self
            .modules
            .get(&hash)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                AgentError::rejected(
                    RejectCode::CanisterError,
                    format!("No native implementation registered for module {}", hash),
                )
            })?;

        let mut entry = self
            .canisters
            .get_mut(canister)
            .ok_or_else(|| not_found(canister))?;

        let instance = factory();
        match (mode, &entry.installed) {
            (InstallMode::Install, Some(_)) => {
                return Err(AgentError::rejected(
                    RejectCode::CanisterError,
                    format!("Canister {} already has code installed", canister),
                ));
            }
            (InstallMode::Upgrade, None) => {
                return Err(AgentError::rejected(
                    RejectCode::CanisterError,
                    format!("Canister {} has no installed code to upgrade", canister),
                ));
            }
            (InstallMode::Upgrade, Some(previous)) => {
                // The old instance stays in place if either hook fails.
                let snapshot = previous
                    .instance
                    .snapshot()
                    .map_err(|e| trapped(canister, "pre-upgrade", e))?;
                instance
                    .restore(&snapshot)
                    .map_err(|e| trapped(canister, "post-upgrade", e))?;
                tracing::debug!(canister = %canister, bytes = snapshot.len(), "carried state across upgrade");
            }
            _ => {}
        }

        entry.installed = Some(Installed {
            module_hash: hash.clone(),
            instance,
        });

        tracing::info!(canister = %canister, module_hash = %hash, ?mode, "installed code");
        Ok(())
    }

    async fn query(&self, canister: &Principal, method: &str, args: &[Value]) -> agent::Result<Vec<Value>> {
        self.dispatch(canister, method, Mode::Query, args).await
    }

    async fn update(&self, canister: &Principal, method: &str, args: &[Value]) -> agent::Result<Vec<Value>> {
        self.dispatch(canister, method, Mode::Update, args).await
    }
}

fn module_hash(module: &[u8]) -> String {
    hex::encode(Sha256::digest(module))
}

fn trapped(canister: &Principal, hook: &str, e: anyhow::Error) -> AgentError {
    tracing::warn!(canister = %canister, hook, error = %e, "upgrade hook failed");
    AgentError::rejected(
        RejectCode::CanisterError,
        format!("Canister {} trapped in {}: {:#}", canister, hook, e),
    )
}

fn not_found(canister: &Principal) -> AgentError {
    AgentError::rejected(
        RejectCode::DestinationInvalid,
        format!("Canister {} not found", canister),
    )
}
