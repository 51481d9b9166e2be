//! HTTP clients for the catalog and the deployment store (ureq, blocking).
//!
//! Path layout, auth headers, and status handling follow the deploy API:
//! session bind exchanges an API key for a bearer token; every later call
//! carries `Authorization: Bearer`. A failed call is surfaced immediately —
//! no retries here; the only waiting loop is [`super::poll`].

use super::{Catalog, Store, NOT_FOUND};
use crate::core::error::{Error, Result};
use crate::core::types::{
    Application, ApplicationResponse, BindResponse, Deployment, KeyValue, Recipe, RecipeResponse,
};
use tracing::{debug, info};

fn unreachable(url: &str, err: &ureq::Error) -> Error {
    Error::CatalogUnreachable {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

fn decode_failed(what: &str, err: std::io::Error) -> Error {
    Error::DecodeFailed {
        what: what.to_string(),
        reason: err.to_string(),
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Catalog client holding a bound session token.
pub struct HttpCatalog {
    agent: ureq::Agent,
    url: String,
    token: String,
}

impl HttpCatalog {
    /// Exchange an API key for a session token and return a bound client.
    pub fn bind(url: &str, apikey: &str) -> Result<Self> {
        let url = url.trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new().build();
        let endpoint = format!("{}/deploy/session/bind", url);
        info!(url = %url, "binding catalog session");
        match agent
            .post(&endpoint)
            .set("X-API-Key", apikey)
            .set("Content-Type", "application/json")
            .call()
        {
            Ok(resp) => {
                let bind: BindResponse = resp
                    .into_json()
                    .map_err(|e| decode_failed("session bind", e))?;
                Ok(Self {
                    agent,
                    url,
                    token: bind.token,
                })
            }
            Err(ureq::Error::Status(status, _)) => Err(Error::BindFailed { status }),
            Err(e) => Err(unreachable(&url, &e)),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl Catalog for HttpCatalog {
    fn application(&self, namespace: &str, application: &str) -> Result<Application> {
        let endpoint = format!("{}/deploy/ns/{}/app/{}", self.url, namespace, application);
        info!(namespace, application, "loading application");
        match self
            .agent
            .get(&endpoint)
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .call()
        {
            Ok(resp) => {
                let envelope: ApplicationResponse = resp
                    .into_json()
                    .map_err(|e| decode_failed("application", e))?;
                Ok(envelope.app)
            }
            Err(ureq::Error::Status(status, _)) => Err(Error::ApplicationNotFound {
                application: application.to_string(),
                status,
            }),
            Err(e) => Err(unreachable(&self.url, &e)),
        }
    }

    fn recipe(&self, namespace: &str, id: &str) -> Result<Recipe> {
        let endpoint = format!("{}/deploy/ns/{}/recipe/{}", self.url, namespace, id);
        info!(namespace, recipe = id, "loading recipe");
        match self
            .agent
            .get(&endpoint)
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .call()
        {
            Ok(resp) => {
                let envelope: RecipeResponse =
                    resp.into_json().map_err(|e| decode_failed("recipe", e))?;
                debug!(recipe = %envelope.recipe.name, "fetched recipe");
                Ok(envelope.recipe)
            }
            Err(ureq::Error::Status(status, _)) => Err(Error::RecipeNotFound {
                recipe: id.to_string(),
                status,
            }),
            Err(e) => Err(unreachable(&self.url, &e)),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Deployment store client authenticated with the deployment token.
pub struct HttpStore {
    agent: ureq::Agent,
    address: String,
    token: String,
}

impl HttpStore {
    pub fn new(address: &str, token: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            address: address.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// One-shot read on the legacy `/deployment/` path. Any non-200 other
    /// than 403 yields the [`NOT_FOUND`] sentinel, conflating "key absent"
    /// with transient server errors — kept for compatibility.
    pub fn read_once(&self, deployment: &str, key: &str) -> Result<String> {
        let endpoint = format!("{}/deployment/{}/{}", self.address, deployment, key);
        match self
            .agent
            .get(&endpoint)
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .call()
        {
            Ok(resp) => {
                let kv: KeyValue = resp.into_json().map_err(|e| decode_failed("key read", e))?;
                Ok(kv.value)
            }
            Err(ureq::Error::Status(403, _)) => Err(Error::Unauthorized),
            Err(ureq::Error::Status(status, _)) => {
                info!(key, status, "key not found");
                Ok(NOT_FOUND.to_string())
            }
            Err(e) => Err(unreachable(&self.address, &e)),
        }
    }
}

impl Store for HttpStore {
    fn put(&self, deployment: &str, key: &str, value: &str) -> Result<()> {
        let endpoint = format!("{}/store/{}", self.address, deployment);
        info!(key, deployment, "storing key");
        let body = KeyValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match self
            .agent
            .put(&endpoint)
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .send_json(&body)
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, _)) => Err(Error::StoreWriteFailed {
                key: key.to_string(),
                status,
            }),
            Err(e) => Err(unreachable(&self.address, &e)),
        }
    }

    fn get(&self, deployment: &str, key: &str) -> Result<Option<String>> {
        let endpoint = format!("{}/store/{}/{}", self.address, deployment, key);
        match self
            .agent
            .get(&endpoint)
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .call()
        {
            Ok(resp) => {
                let kv: KeyValue = resp.into_json().map_err(|e| decode_failed("key read", e))?;
                debug!(key = %kv.key, "fetched key");
                Ok(Some(kv.value))
            }
            Err(ureq::Error::Status(403, _)) => Err(Error::Unauthorized),
            Err(ureq::Error::Status(_, _)) => Ok(None),
            Err(e) => Err(unreachable(&self.address, &e)),
        }
    }
}

// ============================================================================
// Deployment lifecycle
// ============================================================================

/// Create a deployment: a fresh store scope with its own bearer token.
pub fn create_deployment(url: &str, apikey: &str) -> Result<Deployment> {
    let url = url.trim_end_matches('/');
    let endpoint = format!("{}/store", url);
    info!(url, "creating deployment");
    match ureq::agent()
        .post(&endpoint)
        .set("X-API-Key", apikey)
        .set("Content-Type", "application/json")
        .call()
    {
        Ok(resp) => {
            let deployment: Deployment = resp
                .into_json()
                .map_err(|e| decode_failed("deployment", e))?;
            info!(id = %deployment.id, "deployment created");
            Ok(deployment)
        }
        Err(ureq::Error::Status(status, _)) => Err(Error::DeploymentFailed {
            op: "create",
            status,
        }),
        Err(e) => Err(unreachable(url, &e)),
    }
}

/// Delete a deployment and its stored keys.
pub fn delete_deployment(url: &str, deployment: &str, token: &str) -> Result<()> {
    let url = url.trim_end_matches('/');
    let endpoint = format!("{}/store/{}", url, deployment);
    info!(url, deployment, "deleting deployment");
    match ureq::agent()
        .delete(&endpoint)
        .set("Authorization", &format!("Bearer {}", token))
        .set("Content-Type", "application/json")
        .call()
    {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(status, _)) => Err(Error::DeploymentFailed {
            op: "delete",
            status,
        }),
        Err(e) => Err(unreachable(url, &e)),
    }
}
