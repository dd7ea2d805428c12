//! Ingredient registry: (ingredient, method) → prototype, and the factory
//! that turns a step declaration into a cooker.

use super::cooker::{Cooker, Ingredient};
use super::error::CookError;
use super::types::{Params, StepId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type MethodTable = HashMap<String, Arc<dyn Ingredient>>;

/// Process-scoped ingredient registry.
///
/// Construct one at startup, register every ingredient, then share it
/// (usually behind an `Arc`) with whatever materializes steps.
#[derive(Default)]
pub struct Registry {
    ingredients: Mutex<HashMap<String, MethodTable>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `prototype` under every method it declares. A later
    /// registration of the same (ingredient, method) replaces the earlier one.
    pub fn register_all_methods(&self, prototype: Arc<dyn Ingredient>) {
        let (name, methods) = prototype.methods();
        let mut guard = self.ingredients.lock();
        let table = guard.entry(name.to_string()).or_default();
        for method in methods {
            table.insert(method.to_string(), Arc::clone(&prototype));
        }
        debug!(ingredient = name, methods = methods.len(), "registered ingredient");
    }

    /// Prototype registered for (ingredient, method).
    pub fn lookup(&self, ingredient: &str, method: &str) -> Result<Arc<dyn Ingredient>, CookError> {
        let guard = self.ingredients.lock();
        let table = guard
            .get(ingredient)
            .ok_or_else(|| CookError::UnknownIngredient(ingredient.to_string()))?;
        table
            .get(method)
            .map(Arc::clone)
            .ok_or_else(|| CookError::UnknownMethod {
                ingredient: ingredient.to_string(),
                method: method.to_string(),
            })
    }

    /// Build a step-bound cooker. The prototype's `parse` runs outside the
    /// registry lock.
    pub fn new_recipe_cooker(
        &self,
        id: &StepId,
        ingredient: &str,
        method: &str,
        params: Params,
    ) -> Result<Box<dyn Cooker>, CookError> {
        let prototype = self.lookup(ingredient, method)?;
        debug!(step = %id, ingredient, method, "cooking");
        prototype.parse(id.clone(), method, params)
    }

    /// Registered ingredient names, sorted.
    pub fn ingredients(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ingredients.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered methods of one ingredient, sorted.
    pub fn methods(&self, ingredient: &str) -> Result<Vec<String>, CookError> {
        let guard = self.ingredients.lock();
        let table = guard
            .get(ingredient)
            .ok_or_else(|| CookError::UnknownIngredient(ingredient.to_string()))?;
        let mut methods: Vec<String> = table.keys().cloned().collect();
        methods.sort();
        Ok(methods)
    }
}
