//! Error taxonomy for catalog access, resolution, and assembly.
//!
//! Every failure aborts the enclosing resolution or assembly immediately —
//! there is no partial-success mode. The only retry anywhere is the bounded
//! store poll, and 403 is never retried.

use thiserror::Error;

/// Hard cap on parent-chain length. A walk that reaches this many steps is
/// treated as a cyclic recipe graph.
pub const MAX_CHAIN: usize = 1000;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure contacting the catalog or the store.
    #[error("failed to contact server {url}: {reason}")]
    CatalogUnreachable { url: String, reason: String },

    /// 403 from an authenticated store read. Terminal — never retried.
    #[error("failed to get key, unauthorized")]
    Unauthorized,

    /// Session bind rejected by the catalog.
    #[error("failed to bind session (status {status})")]
    BindFailed { status: u16 },

    /// Application lookup returned a non-success status.
    #[error("application '{application}' not found (status {status})")]
    ApplicationNotFound { application: String, status: u16 },

    /// Recipe lookup returned a non-success status.
    #[error("recipe '{recipe}' not found (status {status})")]
    RecipeNotFound { recipe: String, status: u16 },

    /// A top-level recipe of the application could not be resolved.
    #[error("failed to resolve recipe '{recipe}'")]
    RecipeResolutionFailed {
        recipe: String,
        #[source]
        source: Box<Error>,
    },

    /// Parent walk exceeded [`MAX_CHAIN`] without terminating.
    #[error("recipe '{recipe}' has a cyclic parent chain (more than {MAX_CHAIN} ancestors)")]
    CyclicRecipeGraph { recipe: String },

    /// Store write failed while persisting a resolved recipe script.
    #[error("failed to store script for recipe '{recipe}'")]
    ScriptPersistFailed {
        recipe: String,
        #[source]
        source: Box<Error>,
    },

    /// Store write failed (transport error or non-success status).
    #[error("failed to store key '{key}' (status {status})")]
    StoreWriteFailed { key: String, status: u16 },

    /// Deployment create/delete rejected by the store.
    #[error("failed to {op} deployment (status {status})")]
    DeploymentFailed { op: &'static str, status: u16 },

    /// Response body did not parse as the expected envelope.
    #[error("failed to decode {what} response: {reason}")]
    DecodeFailed { what: String, reason: String },

    /// Local filesystem failure (bootstrap document write).
    #[error("i/o error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
