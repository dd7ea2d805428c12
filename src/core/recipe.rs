//! Recipe loading pipeline and include closure.
//!
//! `load` runs resolve → read → render → parse for one recipe; `closure`
//! repeats it across `includes` until no unseen names remain.

use super::error::RecipeError;
use super::parser::{parse_document, RecipeDocument};
use super::resolver::resolve_recipe_path;
use super::template::Renderer;
use super::types::RecipeName;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// A recipe root plus the renderer used for every document under it.
pub struct RecipeBook {
    root: PathBuf,
    renderer: Renderer,
}

impl RecipeBook {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_renderer(root, Renderer::new())
    }

    pub fn with_renderer(root: impl Into<PathBuf>, renderer: Renderer) -> Self {
        Self {
            root: root.into(),
            renderer,
        }
    }

    pub fn resolve(&self, name: &RecipeName) -> Result<PathBuf, RecipeError> {
        resolve_recipe_path(&self.root, name)
    }

    /// Resolve and render a recipe without parsing it.
    pub fn render(&self, name: &RecipeName) -> Result<String, RecipeError> {
        let path = self.resolve(name)?;
        let raw = std::fs::read_to_string(&path).map_err(|source| RecipeError::Io {
            path: path.clone(),
            source,
        })?;
        self.renderer.render(name.as_str(), &raw)
    }

    pub fn load(&self, name: &RecipeName) -> Result<RecipeDocument, RecipeError> {
        let rendered = self.render(name)?;
        parse_document(name.as_str(), &rendered)
    }

    /// Includes declared by one recipe.
    pub fn includes_of(&self, name: &RecipeName) -> Result<Vec<RecipeName>, RecipeError> {
        self.load(name)?.includes()
    }

    /// Every recipe reachable from `seeds` through `includes`, seeds
    /// included. Each name is loaded once; cycles terminate. The recipes of
    /// one frontier level load in parallel.
    pub fn closure(&self, seeds: &[RecipeName]) -> Result<BTreeSet<RecipeName>, RecipeError> {
        let mut visited: BTreeSet<RecipeName> = BTreeSet::new();
        let mut frontier: Vec<RecipeName> = Vec::new();
        for seed in seeds {
            if visited.insert(seed.clone()) {
                frontier.push(seed.clone());
            }
        }

        let mut depth = 0usize;
        while !frontier.is_empty() {
            debug!(depth, pending = frontier.len(), "expanding include frontier");
            let level: Vec<Vec<RecipeName>> = frontier
                .par_iter()
                .map(|name| self.includes_of(name))
                .collect::<Result<_, _>>()?;

            frontier = level
                .into_iter()
                .flatten()
                .filter(|name| visited.insert(name.clone()))
                .collect();
            depth += 1;
        }

        info!(recipes = visited.len(), "include closure complete");
        Ok(visited)
    }
}
