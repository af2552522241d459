//! An in-process platform for canisters implemented natively in Rust.

pub mod native;
pub mod replica;

pub use native::NativeCanister;
pub use replica::LocalReplica;

#[cfg(test)]
mod tests;
