//! Core engine: types, recipe pipeline, cooker contract, registry and execution.

pub mod config;
pub mod cooker;
pub mod error;
pub mod executor;
pub mod params;
pub mod parser;
pub mod recipe;
pub mod registry;
pub mod resolver;
pub mod template;
pub mod types;
