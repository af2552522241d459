//! # Actor Proxy
//!
//! An `Actor` is the local stand-in for a canister: calling a method on it is
//! one round trip through the agent.
//!
//! The actor holds no per-call state. Constructing one never touches the
//! network, so an actor bound to an address that hosts nothing (or something
//! else) only fails once a method is invoked.
//!
//! ## Invariants
//!
//! - Only methods named by the interface are sent.
//! - Arguments are checked against the signature before sending, results
//!   after receiving.
//! - Agent errors are returned as-is inside `ActorError::Agent`.

use std::fmt;
use std::sync::Arc;

use crate::agent::Agent;
use crate::agent::AgentError;
use crate::idl::Value;
use crate::interface::Interface;
use crate::interface::Mode;
use crate::interface::SignatureError;
use crate::principal::Principal;

/// Errors during remote invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// The interface has no such method.
    UnknownMethod(String),
    /// Arguments do not fit the method signature.
    Arguments { method: String, error: SignatureError },
    /// The reply does not fit the method signature.
    Results { method: String, error: SignatureError },
    /// A reply value could not be read back into a typed result.
    Decode { method: String, error: crate::idl::Error },
    /// Failure raised by the agent.
    Agent(AgentError),
}

impl fmt::Display for ActorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMethod(method) => write!(f, "Unknown method '{}'", method),
            Self::Arguments { method, error } => write!(f, "Bad arguments for '{}': {}", method, error),
            Self::Results { method, error } => write!(f, "Bad reply from '{}': {}", method, error),
            Self::Decode { method, error } => write!(f, "Cannot decode reply from '{}': {}", method, error),
            Self::Agent(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ActorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Arguments { error, .. } | Self::Results { error, .. } => Some(error),
            Self::Decode { error, .. } => Some(error),
            Self::Agent(e) => Some(e),
            Self::UnknownMethod(_) => None,
        }
    }
}

impl From<AgentError> for ActorError {
    fn from(e: AgentError) -> Self {
        Self::Agent(e)
    }
}

pub type Result<T> = std::result::Result<T, ActorError>;

/// Proxy for a canister at a fixed address.
#[derive(Clone)]
pub struct Actor {
    agent: Arc<dyn Agent>,
    canister_id: Principal,
    interface: Arc<Interface>,
}

impl Actor {
    pub fn new(agent: Arc<dyn Agent>, canister_id: Principal, interface: Interface) -> Self {
        Self {
            agent,
            canister_id,
            interface: Arc::new(interface),
        }
    }

    pub fn canister_id(&self) -> &Principal {
        &self.canister_id
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// Invokes `method` with `args` and returns its results.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let sig = self
            .interface
            .get(method)
            .ok_or_else(|| ActorError::UnknownMethod(method.to_string()))?;

        sig.check_args(&args).map_err(|error| ActorError::Arguments {
            method: method.to_string(),
            error,
        })?;

        tracing::debug!(canister = %self.canister_id, method, mode = %sig.mode, "calling canister");

        let results = match sig.mode {
            Mode::Query => self.agent.query(&self.canister_id, method, &args).await?,
            Mode::Update => self.agent.update(&self.canister_id, method, &args).await?,
        };

        sig.check_results(&results).map_err(|error| ActorError::Results {
            method: method.to_string(),
            error,
        })?;

        Ok(results)
    }

    /// Invokes a method declared with exactly one result.
    pub async fn call_one(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let results = self.call(method, args).await?;
        let found = results.len();
        match results.into_iter().next() {
            Some(value) if found == 1 => Ok(value),
            _ => Err(ActorError::Results {
                method: method.to_string(),
                error: SignatureError::Arity { expected: 1, found },
            }),
        }
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("canister_id", &self.canister_id)
            .field("interface", &self.interface.name())
            .finish()
    }
}
