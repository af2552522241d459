//! # Agent Abstraction
//!
//! The agent is the external transport that signs and sends requests to the
//! platform. Everything in this workspace talks to canisters through this
//! trait and never looks past it.
//!
//! ## Philosophy
//!
//! - **Pass-through**: agent failures are surfaced to callers unchanged.
//!   Nothing above this layer retries or translates them.
//! - **Object-safe**: agents are shared as `Arc<dyn Agent>`.

use std::fmt;

use crate::idl::Value;
use crate::principal::Principal;

/// Reject codes reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    SysFatal = 1,
    SysTransient = 2,
    DestinationInvalid = 3,
    CanisterReject = 4,
    CanisterError = 5,
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SysFatal => write!(f, "SysFatal"),
            Self::SysTransient => write!(f, "SysTransient"),
            Self::DestinationInvalid => write!(f, "DestinationInvalid"),
            Self::CanisterReject => write!(f, "CanisterReject"),
            Self::CanisterError => write!(f, "CanisterError"),
        }
    }
}

/// Errors raised by an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The platform (or the canister) rejected the request.
    Rejected { code: RejectCode, message: String },
    /// The request could not be delivered.
    Transport(String),
    /// No reply arrived in time.
    Timeout,
}

impl AgentError {
    pub fn rejected(code: RejectCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { code, message } => write!(f, "Rejected ({}): {}", code, message),
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for AgentError {}

pub type Result<T> = std::result::Result<T, AgentError>;

/// How code is placed into a canister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// The canister must be empty.
    Install,
    /// Replace the installed code and wipe its state.
    Reinstall,
    /// Replace the installed code and keep its state.
    Upgrade,
}

/// A signed channel to the platform.
#[async_trait::async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Allocates a fresh, empty canister and returns its address.
    async fn create_canister(&self) -> Result<Principal>;

    /// Installs `module` into `canister`.
    async fn install_code(&self, canister: &Principal, module: &[u8], mode: InstallMode) -> Result<()>;

    /// Calls a read-only method.
    async fn query(&self, canister: &Principal, method: &str, args: &[Value]) -> Result<Vec<Value>>;

    /// Calls a state-changing method and waits for its certified reply.
    async fn update(&self, canister: &Principal, method: &str, args: &[Value]) -> Result<Vec<Value>>;
}
