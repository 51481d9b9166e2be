//! Semilla — application bootstrap assembly.
//!
//! Resolves a named application from a remote catalog into a single
//! self-contained bootstrap script: recipe parent chains are flattened,
//! deduplicated, and ordered; scripts are substituted and persisted to the
//! deployment store; the assembled document is what a provisioned machine
//! executes on first boot.

pub mod cli;
pub mod client;
pub mod core;
