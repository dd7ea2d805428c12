//! Farmhand: the recipe and ingredient core of a configuration-management agent.
//!
//! Recipes are dotted names resolved to template files, rendered strictly and
//! parsed into documents whose `includes` form a closure. Steps name an
//! ingredient and method; the registry builds a cooker for each, which can
//! `test` (predict) or `apply` (converge) its state.

pub mod cache;
pub mod cli;
pub mod core;
pub mod ingredients;
pub mod logging;
