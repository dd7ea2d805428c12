//! Core value types shared by the recipe pipeline and the ingredients.
//!
//! Recipe names, step identifiers, step parameters and the `CookResult`
//! reported back to the farmer for every Test/Apply.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Recipes
// ============================================================================

/// Hierarchical, dot-delimited recipe identifier (e.g. `web.nginx.config`).
///
/// Every segment but the last names a directory under the recipe root; the
/// last names the recipe file (plus the fixed extension).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeName(String);

impl RecipeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for RecipeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecipeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Identifier of a declared step, scoped to its recipe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Step-scoped parameters, as written by the recipe author.
pub type Params = IndexMap<String, serde_yaml_ng::Value>;

// ============================================================================
// Results
// ============================================================================

/// Human-readable note attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Note(String);

impl Note {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Note {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Note {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Outcome of a Test or Apply.
///
/// Exactly one of `succeeded`/`failed` is set. For Apply, `changed` means a
/// mutation happened; for Test it predicts that Apply would mutate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookResult {
    pub succeeded: bool,
    pub failed: bool,
    pub changed: bool,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl CookResult {
    /// Successful outcome.
    pub fn success(changed: bool) -> Self {
        Self {
            succeeded: true,
            failed: false,
            changed,
            notes: Vec::new(),
        }
    }

    /// Failed outcome. Never reports a change.
    pub fn failure() -> Self {
        Self {
            succeeded: false,
            failed: true,
            changed: false,
            notes: Vec::new(),
        }
    }

    /// Append a note.
    pub fn with_note(mut self, note: impl Into<Note>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Append several notes, preserving order.
    pub fn with_notes<I, N>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Note>,
    {
        self.notes.extend(notes.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CookResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match (self.succeeded, self.changed) {
            (true, true) => "CHANGED",
            (true, false) => "OK",
            (false, _) => "FAILED",
        };
        write!(f, "{}", status)?;
        for note in &self.notes {
            write!(f, "\n  - {}", note)?;
        }
        Ok(())
    }
}

// ============================================================================
// YAML helpers
// ============================================================================

/// Name the type of a YAML value for diagnostics.
pub fn yaml_type_name(val: &serde_yaml_ng::Value) -> &'static str {
    match val {
        serde_yaml_ng::Value::Null => "null",
        serde_yaml_ng::Value::Bool(_) => "bool",
        serde_yaml_ng::Value::Number(_) => "number",
        serde_yaml_ng::Value::String(_) => "string",
        serde_yaml_ng::Value::Sequence(_) => "sequence",
        serde_yaml_ng::Value::Mapping(_) => "mapping",
        serde_yaml_ng::Value::Tagged(_) => "tagged value",
    }
}

// ============================================================================
// Tests
// ============================================================================
