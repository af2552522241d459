//! Typed service surfaces.
//!
//! A `Service` is the capability set of a canister: a hand-written or
//! generated wrapper whose async methods forward to an [`Actor`] built from
//! the service's own interface description.

use std::sync::Arc;

use crate::actor::Actor;
use crate::agent::Agent;
use crate::interface::Interface;
use crate::principal::Principal;

pub trait Service: Send + Sync + Sized + 'static {
    /// The method catalog the actor is built from.
    fn interface() -> Interface;

    /// Wraps an actor built from [`Service::interface`].
    fn from_actor(actor: Actor) -> Self;

    /// Binds the service to `canister_id`. No network traffic.
    fn bind(agent: Arc<dyn Agent>, canister_id: Principal) -> Self {
        Self::from_actor(Actor::new(agent, canister_id, Self::interface()))
    }
}
