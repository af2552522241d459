//! Client-side vocabulary for talking to canisters: addresses, values,
//! interface descriptions, the agent seam and the actor proxy built on it.

pub mod actor;
pub mod agent;
pub mod identity;
pub mod idl;
pub mod interface;
pub mod principal;
pub mod service;

pub use actor::Actor;
pub use actor::ActorError;
pub use agent::Agent;
pub use agent::AgentError;
pub use agent::InstallMode;
pub use agent::RejectCode;
pub use identity::AnonymousIdentity;
pub use identity::BasicIdentity;
pub use identity::Identity;
pub use idl::Type;
pub use idl::Value;
pub use interface::Interface;
pub use interface::Method;
pub use interface::Mode;
pub use principal::Principal;
pub use principal::PrincipalError;
pub use service::Service;
