//! Caller identities.

use crate::principal::Principal;

/// The credential an agent signs requests with.
pub trait Identity: Send + Sync + 'static {
    /// The principal requests are sent as.
    fn sender(&self) -> Principal;
}

/// Unsigned requests, sent as `2vxsx-fae`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn sender(&self) -> Principal {
        Principal::anonymous()
    }
}

/// An identity that is known only by its principal.
#[derive(Debug, Clone)]
pub struct BasicIdentity {
    principal: Principal,
}

impl BasicIdentity {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}

impl Identity for BasicIdentity {
    fn sender(&self) -> Principal {
        self.principal.clone()
    }
}
