//! Recipe graph resolution — parent chain walking, tag filtering, dedup.
//!
//! Turns an application's recipe list into a flat, ordered, deduplicated
//! plan. Parent chains are walked iteratively with a hard cap so a cyclic
//! graph fails fast instead of looping; ancestors run before the recipes
//! that chain to them; a recipe name is materialized at most once per
//! resolution, at its first encounter.

use super::error::{Error, Result, MAX_CHAIN};
use super::types::{Application, BootstrapOptions, PlanItem, PlanSection, Recipe, ResolutionPlan};
use crate::client::Catalog;
use tracing::{debug, info};

/// Walk a recipe's parent chain, nearest parent first.
///
/// Returns the empty sequence for a parentless recipe. The walk is bounded
/// by [`MAX_CHAIN`]; reaching the cap means the parent graph re-references
/// itself and fails with `CyclicRecipeGraph`. Callers wanting oldest-first
/// application order must reverse the chain themselves.
pub fn ancestors(catalog: &dyn Catalog, namespace: &str, recipe: &Recipe) -> Result<Vec<Recipe>> {
    let mut chain: Vec<Recipe> = Vec::new();
    let mut next = recipe.parent.clone();

    while let Some(parent_id) = next {
        if chain.len() >= MAX_CHAIN {
            return Err(Error::CyclicRecipeGraph {
                recipe: recipe.name.clone(),
            });
        }
        debug!(parent = %parent_id, "loading parent recipe");
        let parent = catalog.recipe(namespace, &parent_id)?;
        next = parent.parent.clone();
        chain.push(parent);
    }

    Ok(chain)
}

/// Whether a recipe's tags pass the filter set.
///
/// An empty filter admits everything, and a recipe with no tags matches any
/// filter — untagged recipes are deliberately always included.
pub fn tags_match(filter: &[String], tags: &[String]) -> bool {
    if filter.is_empty() || tags.is_empty() {
        return true;
    }
    tags.iter().any(|tag| filter.contains(tag))
}

/// Resolve an application into an ordered, deduplicated plan.
///
/// Top-level recipes are processed in application list order. Each included
/// entry contributes one section: its not-yet-seen ancestors (oldest first),
/// then the recipe itself if not yet seen. A tag-excluded entry contributes
/// nothing — its ancestors are skipped too.
pub fn resolve(
    catalog: &dyn Catalog,
    options: &BootstrapOptions,
    app: &Application,
) -> Result<ResolutionPlan> {
    let mut plan = ResolutionPlan::default();

    for recipe_id in &app.recipes {
        let recipe = catalog
            .recipe(&options.namespace, recipe_id)
            .map_err(|e| Error::RecipeResolutionFailed {
                recipe: recipe_id.clone(),
                source: Box::new(e),
            })?;

        if !tags_match(&options.tags, &recipe.tags) {
            info!(recipe = %recipe.name, "recipe excluded by tag filter");
            continue;
        }

        let mut section = PlanSection {
            name: recipe.name.clone(),
            items: Vec::new(),
        };

        if recipe.parent.is_some() {
            let mut chain = ancestors(catalog, &options.namespace, &recipe)?;
            // Walker order is nearest-parent-first; apply oldest first.
            chain.reverse();
            for ancestor in chain {
                if plan.seen.insert(ancestor.name.clone()) {
                    section.items.push(PlanItem {
                        recipe: ancestor,
                        parent: true,
                    });
                }
            }
        }

        if plan.seen.insert(recipe.name.clone()) {
            section.items.push(PlanItem {
                recipe,
                parent: false,
            });
        }

        plan.sections.push(section);
    }

    info!(recipes = plan.len(), "resolution complete");
    Ok(plan)
}
