//! Data model — catalog entities, wire envelopes, resolution plan, options.
//!
//! Recipes and applications are read-only from this crate's perspective:
//! created and edited in the catalog, fetched by identifier, never mutated.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Catalog entities
// ============================================================================

/// A named, versionable shell-script fragment held by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Opaque recipe identifier (catalog handle)
    pub id: String,

    /// Recipe name — the deduplication key during resolution
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Script body, containing `${SEM_*}` placeholder tokens
    #[serde(default)]
    pub script: String,

    /// Visibility flag
    #[serde(default)]
    pub public: bool,

    /// Owning namespace
    #[serde(default)]
    pub namespace: String,

    /// Base image label
    #[serde(default)]
    pub base_image: String,

    /// Parent recipe identifier, if this recipe chains to one.
    /// Must resolve within the same namespace.
    #[serde(default)]
    pub parent: Option<String>,

    /// Tag labels used for filtering
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An application — an ordered list of recipe identifiers plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub public: bool,

    /// Recipe identifiers, in application order. Identifiers may repeat here;
    /// the resolved plan never applies the same recipe name twice.
    #[serde(default)]
    pub recipes: Vec<String>,

    #[serde(default)]
    pub namespace: String,

    /// Named deployment templates (order-preserving)
    #[serde(default)]
    pub templates: IndexMap<String, String>,

    /// Expected input variables: name → default/label
    #[serde(default)]
    pub inputs: IndexMap<String, String>,
}

// ============================================================================
// Wire envelopes
// ============================================================================

/// Session bind answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindResponse {
    pub token: String,
}

/// Application lookup envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub app: Application,
}

/// Recipe lookup envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub recipe: Recipe,
}

/// Key/value pair stored under a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// A provisioning session with its own key/value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub url: String,
    pub id: String,
    pub token: String,
}

// ============================================================================
// Resolution plan
// ============================================================================

/// One recipe materialized into the plan.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub recipe: Recipe,

    /// True when this recipe entered the plan as an ancestor of a top-level
    /// entry rather than as the entry itself.
    pub parent: bool,
}

/// The contribution of one top-level application recipe: every recipe first
/// materialized while expanding it, oldest ancestor first.
#[derive(Debug, Clone)]
pub struct PlanSection {
    /// Name of the top-level recipe this section expands
    pub name: String,

    pub items: Vec<PlanItem>,
}

/// The flattened, deduplicated, ordered list of recipes to apply for one
/// application instantiation.
///
/// Invariant: within a section, ancestors precede the recipe that depends on
/// them; once a recipe name appears anywhere in the plan it never appears
/// again, even via another section or a shared ancestor.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    pub sections: Vec<PlanSection>,

    /// Recipe names already materialized, global across the resolution
    pub seen: HashSet<String>,
}

impl ResolutionPlan {
    /// Iterate every materialized recipe in plan order.
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter())
            .map(|i| &i.recipe)
    }

    /// Number of materialized recipes across all sections.
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.items.is_empty())
    }
}

// ============================================================================
// Bootstrap options
// ============================================================================

/// Connection info and substitution context for one bootstrap run.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Catalog base URL
    pub url: String,

    /// API key exchanged for a session token
    pub apikey: String,

    /// Catalog namespace holding the application and its recipes
    pub namespace: String,

    /// Application identifier
    pub application: String,

    /// Deployment identifier (store scope)
    pub deployment: String,

    /// Bearer token for the deployment store
    pub deployment_token: String,

    /// Store endpoint address; falls back to `url` when empty
    pub deployment_address: String,

    /// Target run name; falls back to the application name
    pub run_name: Option<String>,

    /// Tag filters; empty admits every recipe
    pub tags: Vec<String>,
}

impl BootstrapOptions {
    /// The store address, defaulting to the catalog address.
    pub fn deployment_address(&self) -> &str {
        if self.deployment_address.is_empty() {
            &self.url
        } else {
            &self.deployment_address
        }
    }

    /// The run name substituted into scripts, defaulting to the
    /// application's catalog name.
    pub fn run_name<'a>(&'a self, app: &'a Application) -> &'a str {
        match self.run_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &app.name,
        }
    }
}
