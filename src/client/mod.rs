//! Remote collaborator seams — catalog lookups and the deployment store.
//!
//! The resolver and assembler talk to these traits, never to HTTP directly;
//! the `http` module provides the real clients and tests supply in-memory
//! fakes. Everything is synchronous: each call is one blocking round trip,
//! performed in plan order.

pub mod http;

use crate::core::error::Result;
use crate::core::types::{Application, Recipe};
use std::time::{Duration, Instant};
use tracing::info;

/// Sentinel value reported when a polled key never becomes available.
/// Reported as a value, not an error.
pub const NOT_FOUND: &str = "NotFound";

/// Delay between store poll attempts.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Read access to the recipe catalog, bound to a session.
pub trait Catalog {
    /// Fetch an application definition by name within a namespace.
    fn application(&self, namespace: &str, application: &str) -> Result<Application>;

    /// Fetch a single recipe definition by identifier.
    fn recipe(&self, namespace: &str, id: &str) -> Result<Recipe>;
}

/// Key/value access to a deployment store.
pub trait Store {
    /// Persist a key/value pair under the deployment. Fatal on failure —
    /// callers do not retry.
    fn put(&self, deployment: &str, key: &str, value: &str) -> Result<()>;

    /// Read a key. `Ok(None)` means the key is not available yet (the server
    /// answered, but not with the value); 403 is `Error::Unauthorized` and
    /// terminal.
    fn get(&self, deployment: &str, key: &str) -> Result<Option<String>>;
}

/// Poll the store for a key until it appears or `timeout` elapses.
///
/// Cooperative wait-for-eventual-availability: one read per attempt, a fixed
/// sleep between attempts, wall-clock deadline checked on each iteration.
/// Once the deadline passes the literal [`NOT_FOUND`] value is returned —
/// never an error. Unauthorized reads abort immediately.
pub fn poll(store: &dyn Store, deployment: &str, key: &str, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = store.get(deployment, key)? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            info!(key, "key not available before deadline");
            return Ok(NOT_FOUND.to_string());
        }
        info!(key, "key not available yet, waiting");
        std::thread::sleep(POLL_INTERVAL);
    }
}
