//! Built-in ingredients.

pub mod file;

use crate::cache::CacheStore;
use crate::core::registry::Registry;
use std::sync::Arc;

/// Register every built-in ingredient with `registry`.
///
/// The cache store is shared by all file steps cooked through the registry.
pub fn register_builtin(registry: &Registry, cache: Arc<CacheStore>) {
    registry.register_all_methods(Arc::new(file::FileIngredient::new(cache)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CookError;
    use crate::core::types::{Params, StepId};

    #[test]
    fn test_register_builtin_exposes_file_methods() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        register_builtin(&registry, file::tests::store(dir.path()));

        assert_eq!(registry.ingredients(), vec!["file".to_string()]);
        let mut expected: Vec<String> = file::METHOD_NAMES.iter().map(|m| m.to_string()).collect();
        expected.sort();
        assert_eq!(registry.methods("file").unwrap(), expected);
    }

    #[test]
    fn test_register_builtin_cooks_file_step() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        register_builtin(&registry, file::tests::store(dir.path()));

        let target = dir.path().join("gone");
        let mut params = Params::new();
        params.insert(
            "name".to_string(),
            serde_yaml_ng::Value::String(target.display().to_string()),
        );
        let cooker = registry
            .new_recipe_cooker(&StepId::new("s1"), "file", "absent", params)
            .unwrap();
        let r = cooker.test(&crate::core::cooker::CookContext::new()).unwrap();
        assert!(r.succeeded && !r.changed);

        let err = registry
            .new_recipe_cooker(&StepId::new("s2"), "file", "chmod", Params::new())
            .err()
            .unwrap();
        assert!(matches!(err, CookError::UnknownMethod { .. }));
    }
}
