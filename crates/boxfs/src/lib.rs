//! # Box file system
//!
//! The interface of the box canister, a small hierarchical file system, and
//! both sides of it: `BoxFs`, the typed client proxy, and `MemoryFs`, a native
//! in-memory implementation that a `LocalReplica` can host.
//!
//! `MemoryFs` is behind the default `native` feature. Clients that only talk
//! to a deployed box can turn it off and leave the replica out of their build.

pub mod client;
#[cfg(feature = "native")]
pub mod memory;
pub mod types;

pub use client::BoxFs;
#[cfg(feature = "native")]
pub use memory::MemoryFs;
pub use types::Directory;
pub use types::Entry;
pub use types::EntryKind;
pub use types::File;
pub use types::Path;
pub use types::interface;
