//! # Native canisters
//!
//! Rust implementations of a canister interface that a `LocalReplica` runs in
//! place of the wasm module they stand for.
//!
//! ## Upgrades
//!
//! An upgrade swaps the instance but keeps the canister's state. The old
//! instance writes its state out with [`NativeCanister::snapshot`] and a fresh
//! instance of the new module reads it back with [`NativeCanister::restore`].
//! Both hooks default to carrying nothing over.

use std::sync::Arc;

use canister::Mode;
use canister::Value;

/// A canister implemented natively.
///
/// Errors become `CanisterError` rejects carrying the error chain as message.
#[async_trait::async_trait]
pub trait NativeCanister: Send + Sync + 'static {
    async fn handle(&self, method: &str, mode: Mode, args: Vec<Value>) -> anyhow::Result<Vec<Value>>;

    /// Serializes the state to keep across an upgrade.
    fn snapshot(&self) -> anyhow::Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Loads state written by `snapshot`, before any call reaches the instance.
    fn restore(&self, snapshot: &[u8]) -> anyhow::Result<()> {
        let _ = snapshot;
        Ok(())
    }
}

/// Produces a fresh instance (empty state) on every install.
pub type Factory = Arc<dyn Fn() -> Arc<dyn NativeCanister> + Send + Sync>;
