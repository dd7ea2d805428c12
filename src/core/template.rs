//! Recipe template rendering.
//!
//! Recipes are rendered through minijinja with strict undefined behaviour:
//! referencing an undefined variable or function fails the render instead of
//! silently producing an empty string.

use super::error::RecipeError;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use std::sync::Arc;

/// Helper functions exposed to recipe templates.
///
/// `props`, `secrets`, `hostname` and `id` are always registered; the
/// default implementations fail the render until a farmer provides them.
pub trait TemplateHelpers: Send + Sync {
    /// Look up a node property.
    fn props(&self, key: &str) -> Result<String, String> {
        let _ = key;
        Err(unimplemented_helper("props"))
    }

    /// Look up a secret.
    fn secrets(&self, key: &str) -> Result<String, String> {
        let _ = key;
        Err(unimplemented_helper("secrets"))
    }

    /// Hostname of the node the recipe is rendered for.
    fn hostname(&self) -> Result<String, String> {
        Err(unimplemented_helper("hostname"))
    }

    /// Identity of the node the recipe is rendered for.
    fn id(&self) -> Result<String, String> {
        Err(unimplemented_helper("id"))
    }
}

fn unimplemented_helper(name: &str) -> String {
    format!("{}() is not implemented", name)
}

/// Helpers with no backing data; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedHelpers;

impl TemplateHelpers for UnimplementedHelpers {}

fn helper_error(msg: String) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, msg)
}

/// Strict template renderer for recipe documents.
pub struct Renderer {
    env: Environment<'static>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Renderer whose helper functions are unimplemented.
    pub fn new() -> Self {
        Self::with_helpers(Arc::new(UnimplementedHelpers))
    }

    /// Renderer backed by the given helpers.
    pub fn with_helpers(helpers: Arc<dyn TemplateHelpers>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        let h = Arc::clone(&helpers);
        env.add_function("props", move |key: String| {
            h.props(&key).map_err(helper_error)
        });
        let h = Arc::clone(&helpers);
        env.add_function("secrets", move |key: String| {
            h.secrets(&key).map_err(helper_error)
        });
        let h = Arc::clone(&helpers);
        env.add_function("hostname", move || h.hostname().map_err(helper_error));
        let h = helpers;
        env.add_function("id", move || h.id().map_err(helper_error));

        Self { env }
    }

    /// Render a raw recipe document. `name` is used in diagnostics only.
    pub fn render(&self, name: &str, source: &str) -> Result<String, RecipeError> {
        self.env
            .render_named_str(name, source, minijinja::context! {})
            .map_err(|source| RecipeError::Render {
                name: name.to_string(),
                source,
            })
    }
}
