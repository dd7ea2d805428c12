//! The cooker contract every ingredient implements, plus the cancellation
//! handle passed to Test/Apply.
//!
//! An [`Ingredient`] is a prototype registered once per process; it answers
//! for a family of methods and builds step-bound [`Cooker`]s through
//! [`Ingredient::parse`]. Parse does structural validation only; each method
//! type-checks its own parameters when it runs.

use super::error::{CookError, Interrupt};
use super::types::{CookResult, Params, StepId};
use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Cancellation
// ============================================================================

/// Cancellation and deadline handle for one Test/Apply.
///
/// Clones share the cancel flag, so a caller can keep one clone and cancel
/// work running on another thread.
#[derive(Debug, Clone, Default)]
pub struct CookContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CookContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same cancel flag, with a deadline `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Same cancel flag, with an absolute deadline. An earlier existing
    /// deadline is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail if the operation was cancelled or ran past its deadline.
    pub fn check(&self) -> Result<(), Interrupt> {
        if self.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupt::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Dry-run or converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookMode {
    Test,
    Apply,
}

impl CookMode {
    pub fn is_test(self) -> bool {
        matches!(self, CookMode::Test)
    }
}

impl fmt::Display for CookMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookMode::Test => write!(f, "test"),
            CookMode::Apply => write!(f, "apply"),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Declared type of a method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    String,
    Bool,
    StringList,
}

impl PropType {
    pub fn tag(self) -> &'static str {
        match self {
            PropType::String => "string",
            PropType::Bool => "bool",
            PropType::StringList => "[]string",
        }
    }
}

/// One declared parameter of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropSpec {
    pub key: &'static str,
    pub ty: PropType,
    pub required: bool,
}

impl PropSpec {
    pub const fn req(key: &'static str, ty: PropType) -> Self {
        Self {
            key,
            ty,
            required: true,
        }
    }

    pub const fn opt(key: &'static str, ty: PropType) -> Self {
        Self {
            key,
            ty,
            required: false,
        }
    }

    /// Type tag such as `string,req` or `[]string,opt`.
    pub fn type_tag(&self) -> String {
        let suffix = if self.required { "req" } else { "opt" };
        format!("{},{}", self.ty.tag(), suffix)
    }
}

/// Property name → type tag, in declaration order.
pub type MethodProps = IndexMap<String, String>;

/// Build the documented schema map from a list of specs.
pub fn method_props(specs: &[PropSpec]) -> MethodProps {
    specs
        .iter()
        .map(|s| (s.key.to_string(), s.type_tag()))
        .collect()
}

// ============================================================================
// Traits
// ============================================================================

/// A registered family of state operations.
pub trait Ingredient: Send + Sync {
    /// Ingredient name and the methods it answers for.
    fn methods(&self) -> (&'static str, &'static [&'static str]);

    /// Documented parameter schema of a method. Not enforced.
    fn properties_for_method(&self, method: &str) -> Result<MethodProps, CookError>;

    /// Build a cooker bound to one step.
    fn parse(&self, id: StepId, method: &str, params: Params)
        -> Result<Box<dyn Cooker>, CookError>;
}

/// A step-bound instance of an ingredient.
pub trait Cooker: Ingredient {
    /// Predict whether `apply` would change anything. Never mutates.
    fn test(&self, ctx: &CookContext) -> Result<CookResult, CookError>;

    /// Converge. Applying the same step twice reports `changed = false` the
    /// second time.
    fn apply(&self, ctx: &CookContext) -> Result<CookResult, CookError>;

    /// The step's parameters as a plain serializable map.
    fn properties(&self) -> Result<serde_json::Map<String, serde_json::Value>, CookError>;

    fn cook(&self, mode: CookMode, ctx: &CookContext) -> Result<CookResult, CookError> {
        match mode {
            CookMode::Test => self.test(ctx),
            CookMode::Apply => self.apply(ctx),
        }
    }
}

/// Normalize step parameters to a JSON object.
pub fn params_to_properties(
    params: &Params,
) -> Result<serde_json::Map<String, serde_json::Value>, CookError> {
    match serde_json::to_value(params)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}
