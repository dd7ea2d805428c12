//! Concurrent step runner.
//!
//! Independent steps are cooked in parallel. A failing step is recorded and
//! never aborts the others. No dependency ordering is attempted.

use super::cooker::{CookContext, CookMode};
use super::error::{error_chain, CookError};
use super::registry::Registry;
use super::types::{CookResult, Params, StepId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A step to materialize through the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: StepId,
    pub ingredient: String,
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

/// Result of one step. `error` is set when construction or Test/Apply
/// returned an error; `result` is then a failure carrying the error text.
#[derive(Debug)]
pub struct StepOutcome {
    pub id: StepId,
    pub result: CookResult,
    pub error: Option<CookError>,
    pub duration: Duration,
}

impl StepOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(CookError::is_cancellation)
    }
}

/// Outcomes of a run, in input order.
#[derive(Debug, Default)]
pub struct CookSummary {
    pub outcomes: Vec<StepOutcome>,
}

impl CookSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.succeeded).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.failed).count()
    }

    pub fn changed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.changed).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Parse a YAML list of steps.
pub fn parse_steps(yaml: &str) -> Result<Vec<StepSpec>, serde_yaml_ng::Error> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml_ng::from_str(yaml)
}

/// Cook every step in parallel. `step_timeout` bounds each step separately.
pub fn cook_steps(
    registry: &Registry,
    steps: &[StepSpec],
    mode: CookMode,
    ctx: &CookContext,
    step_timeout: Option<Duration>,
) -> CookSummary {
    let outcomes: Vec<StepOutcome> = steps
        .par_iter()
        .map(|step| {
            let step_ctx = match step_timeout {
                Some(t) => ctx.with_timeout(t),
                None => ctx.clone(),
            };
            cook_one(registry, step, mode, &step_ctx)
        })
        .collect();

    let summary = CookSummary { outcomes };
    info!(
        %mode,
        steps = steps.len(),
        succeeded = summary.succeeded(),
        changed = summary.changed(),
        failed = summary.failed(),
        "cook run complete"
    );
    summary
}

fn cook_one(registry: &Registry, step: &StepSpec, mode: CookMode, ctx: &CookContext) -> StepOutcome {
    let start = Instant::now();
    let cooked = ctx
        .check()
        .map_err(CookError::from)
        .and_then(|()| {
            registry.new_recipe_cooker(&step.id, &step.ingredient, &step.method, step.params.clone())
        })
        .and_then(|cooker| cooker.cook(mode, ctx));

    let (result, error) = match cooked {
        Ok(result) => (result, None),
        Err(err) => {
            let text = error_chain(&err);
            warn!(step = %step.id, error = %text, "step failed");
            (CookResult::failure().with_note(text), Some(err))
        }
    };
    StepOutcome {
        id: step.id.clone(),
        result,
        error,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cooker::{params_to_properties, Cooker, Ingredient, MethodProps};
    use std::sync::Arc;

    /// `ok` succeeds, `boom` errors, `slow` waits for cancellation.
    struct Scripted {
        method: String,
        params: Params,
    }

    impl Ingredient for Scripted {
        fn methods(&self) -> (&'static str, &'static [&'static str]) {
            ("scripted", &["ok", "boom", "slow"])
        }

        fn properties_for_method(&self, _method: &str) -> Result<MethodProps, CookError> {
            Ok(MethodProps::new())
        }

        fn parse(&self, _id: StepId, method: &str, params: Params) -> Result<Box<dyn Cooker>, CookError> {
            Ok(Box::new(Scripted {
                method: method.to_string(),
                params,
            }))
        }
    }

    impl Cooker for Scripted {
        fn test(&self, ctx: &CookContext) -> Result<CookResult, CookError> {
            self.apply(ctx)
        }

        fn apply(&self, ctx: &CookContext) -> Result<CookResult, CookError> {
            match self.method.as_str() {
                "ok" => Ok(CookResult::success(true).with_note("done")),
                "boom" => Err(CookError::MissingName),
                _ => loop {
                    ctx.check()?;
                    std::thread::sleep(Duration::from_millis(5));
                },
            }
        }

        fn properties(&self) -> Result<serde_json::Map<String, serde_json::Value>, CookError> {
            params_to_properties(&self.params)
        }
    }

    fn registry() -> Registry {
        let reg = Registry::new();
        reg.register_all_methods(Arc::new(Scripted {
            method: String::new(),
            params: Params::new(),
        }));
        reg
    }

    fn step(id: &str, ingredient: &str, method: &str) -> StepSpec {
        StepSpec {
            id: StepId::from(id),
            ingredient: ingredient.to_string(),
            method: method.to_string(),
            params: Params::new(),
        }
    }

    #[test]
    fn test_executor_failures_are_isolated() {
        let reg = registry();
        let steps = vec![
            step("a", "scripted", "ok"),
            step("b", "scripted", "boom"),
            step("c", "nope", "ok"),
            step("d", "scripted", "ok"),
        ];
        let summary = cook_steps(&reg, &steps, CookMode::Apply, &CookContext::new(), None);
        assert_eq!(summary.outcomes.len(), 4);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.changed(), 2);
        assert!(!summary.all_succeeded());

        let ids: Vec<_> = summary.outcomes.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        let c = &summary.outcomes[2];
        assert!(c.error.as_ref().unwrap().is_lookup_failure());
        assert!(c.result.notes[0].as_str().contains("unknown ingredient 'nope'"));
    }

    #[test]
    fn test_executor_step_timeout_is_cancellation() {
        let reg = registry();
        let steps = vec![step("slow", "scripted", "slow"), step("fast", "scripted", "ok")];
        let summary = cook_steps(
            &reg,
            &steps,
            CookMode::Test,
            &CookContext::new(),
            Some(Duration::from_millis(20)),
        );
        assert!(summary.outcomes[0].is_cancelled());
        assert!(summary.outcomes[1].result.succeeded);
    }

    #[test]
    fn test_executor_cancelled_context_skips_steps() {
        let reg = registry();
        let ctx = CookContext::new();
        ctx.cancel();
        let summary = cook_steps(&reg, &[step("a", "scripted", "ok")], CookMode::Apply, &ctx, None);
        assert!(summary.outcomes[0].is_cancelled());
        assert!(!summary.outcomes[0].result.changed);
    }

    #[test]
    fn test_executor_parse_steps() {
        let yaml = r#"
- id: web-root
  ingredient: file
  method: directory
  params:
    name: /srv/www
- id: no-params
  ingredient: file
  method: exists
"#;
        let steps = parse_steps(yaml).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].id.as_str(), "web-root");
        assert!(steps[0].params.contains_key("name"));
        assert!(steps[1].params.is_empty());
        assert!(parse_steps("").unwrap().is_empty());
    }
}
