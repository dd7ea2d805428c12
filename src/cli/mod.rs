//! CLI subcommands: resolve, render, includes, methods, test, apply, cook.

use crate::cache::CacheStore;
use crate::core::config::{load_config, FarmhandConfig};
use crate::core::cooker::{CookContext, CookMode};
use crate::core::error::error_chain;
use crate::core::executor;
use crate::core::recipe::RecipeBook;
use crate::core::registry::Registry;
use crate::core::types::{Params, RecipeName, StepId};
use crate::ingredients;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config file read when `--config` is not given. Missing means defaults.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/farmhand/farmhand.yaml";

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the file a recipe name resolves to
    Resolve {
        /// Dotted recipe name (e.g. web.nginx)
        recipe: String,

        /// Recipe root (overrides recipe_dir)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print a rendered recipe
    Render {
        /// Dotted recipe name
        recipe: String,

        /// Recipe root (overrides recipe_dir)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print every recipe reachable through includes
    Includes {
        /// Seed recipe names
        #[arg(required = true)]
        recipes: Vec<String>,

        /// Recipe root (overrides recipe_dir)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// List an ingredient's methods, or one method's parameter schema
    Methods {
        /// Ingredient name (e.g. file)
        ingredient: String,

        /// Show the schema of this method
        #[arg(short, long)]
        method: Option<String>,
    },

    /// Predict whether a single step would change anything
    Test(StepArgs),

    /// Converge a single step
    Apply(StepArgs),

    /// Cook a YAML list of steps concurrently
    Cook {
        /// Path to the steps file
        steps: PathBuf,

        /// Apply instead of test
        #[arg(long)]
        apply: bool,
    },
}

/// A step given on the command line.
#[derive(Args, Debug)]
pub struct StepArgs {
    /// Ingredient name
    pub ingredient: String,

    /// Method name
    pub method: String,

    /// Step identifier used in logs
    #[arg(long, default_value = "cli")]
    pub id: String,

    /// Step parameters as a YAML mapping
    #[arg(short, long)]
    pub params: Option<String>,
}

/// Load configuration and dispatch a CLI command.
pub fn dispatch(config: Option<&Path>, cmd: Commands) -> Result<(), String> {
    let config = match config {
        Some(path) => load_config(path, true),
        None => load_config(Path::new(DEFAULT_CONFIG_PATH), false),
    }
    .map_err(|e| error_chain(&e))?;
    run(&config, cmd)
}

/// Run a command against an already loaded configuration.
pub fn run(config: &FarmhandConfig, cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Resolve { recipe, root } => cmd_resolve(&book(config, root), &recipe),
        Commands::Render { recipe, root } => cmd_render(&book(config, root), &recipe),
        Commands::Includes { recipes, root } => cmd_includes(&book(config, root), &recipes),
        Commands::Methods { ingredient, method } => {
            cmd_methods(&registry(config)?, &ingredient, method.as_deref())
        }
        Commands::Test(step) => cmd_step(config, &step, CookMode::Test),
        Commands::Apply(step) => cmd_step(config, &step, CookMode::Apply),
        Commands::Cook { steps, apply } => {
            let mode = if apply { CookMode::Apply } else { CookMode::Test };
            cmd_cook(config, &steps, mode)
        }
    }
}

fn book(config: &FarmhandConfig, root: Option<PathBuf>) -> RecipeBook {
    RecipeBook::new(root.unwrap_or_else(|| config.recipe_dir.clone()))
}

/// Registry with every built-in ingredient, sharing one cache store.
fn registry(config: &FarmhandConfig) -> Result<Registry, String> {
    let cache = CacheStore::with_http(&config.cache_dir, config.http_timeout())
        .map_err(|e| format!("cannot build HTTP client: {}", error_chain(&e)))?;
    let registry = Registry::new();
    ingredients::register_builtin(&registry, Arc::new(cache));
    Ok(registry)
}

fn context(config: &FarmhandConfig) -> CookContext {
    let ctx = CookContext::new();
    match config.step_timeout() {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

fn cmd_resolve(book: &RecipeBook, recipe: &str) -> Result<(), String> {
    let path = book
        .resolve(&RecipeName::from(recipe))
        .map_err(|e| error_chain(&e))?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_render(book: &RecipeBook, recipe: &str) -> Result<(), String> {
    let rendered = book
        .render(&RecipeName::from(recipe))
        .map_err(|e| error_chain(&e))?;
    print!("{}", rendered);
    Ok(())
}

fn cmd_includes(book: &RecipeBook, recipes: &[String]) -> Result<(), String> {
    let seeds: Vec<RecipeName> = recipes.iter().map(|r| RecipeName::from(r.as_str())).collect();
    let closure = book.closure(&seeds).map_err(|e| error_chain(&e))?;
    for name in &closure {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_methods(registry: &Registry, ingredient: &str, method: Option<&str>) -> Result<(), String> {
    match method {
        None => {
            for m in registry.methods(ingredient).map_err(|e| error_chain(&e))? {
                println!("{}", m);
            }
        }
        Some(method) => {
            let props = registry
                .lookup(ingredient, method)
                .and_then(|prototype| prototype.properties_for_method(method))
                .map_err(|e| error_chain(&e))?;
            println!("{}.{}:", ingredient, method);
            for (key, tag) in &props {
                println!("  {}: {}", key, tag);
            }
        }
    }
    Ok(())
}

/// Parse `--params`. An absent or blank value means no parameters.
fn parse_params(yaml: Option<&str>) -> Result<Params, String> {
    match yaml {
        Some(text) if !text.trim().is_empty() => {
            serde_yaml_ng::from_str(text).map_err(|e| format!("invalid --params: {}", e))
        }
        _ => Ok(Params::new()),
    }
}

fn cmd_step(config: &FarmhandConfig, step: &StepArgs, mode: CookMode) -> Result<(), String> {
    let params = parse_params(step.params.as_deref())?;
    let registry = registry(config)?;
    let cooker = registry
        .new_recipe_cooker(&StepId::new(step.id.as_str()), &step.ingredient, &step.method, params)
        .map_err(|e| error_chain(&e))?;
    let result = cooker
        .cook(mode, &context(config))
        .map_err(|e| error_chain(&e))?;

    println!("{} ({}.{} {}): {}", step.id, step.ingredient, step.method, mode, result);
    if result.failed {
        return Err(format!("step {} failed", step.id));
    }
    Ok(())
}

fn cmd_cook(config: &FarmhandConfig, steps_file: &Path, mode: CookMode) -> Result<(), String> {
    let content = std::fs::read_to_string(steps_file)
        .map_err(|e| format!("cannot read {}: {}", steps_file.display(), e))?;
    let steps = executor::parse_steps(&content)
        .map_err(|e| format!("invalid steps file {}: {}", steps_file.display(), e))?;
    let registry = registry(config)?;

    let summary = executor::cook_steps(
        &registry,
        &steps,
        mode,
        &CookContext::new(),
        config.step_timeout(),
    );

    for outcome in &summary.outcomes {
        println!(
            "{}: {} ({:.1}s)",
            outcome.id,
            outcome.result,
            outcome.duration.as_secs_f64()
        );
    }
    println!();
    println!(
        "Cook ({}) complete: {} succeeded, {} changed, {} failed.",
        mode,
        summary.succeeded(),
        summary.changed(),
        summary.failed()
    );

    if !summary.all_succeeded() {
        return Err(format!("{} step(s) failed", summary.failed()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(dir: &Path) -> FarmhandConfig {
        FarmhandConfig {
            recipe_dir: dir.join("recipes"),
            cache_dir: dir.join("cache"),
            ..FarmhandConfig::default()
        }
    }

    fn write_recipe(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn step(ingredient: &str, method: &str, params: Option<&str>) -> StepArgs {
        StepArgs {
            ingredient: ingredient.to_string(),
            method: method.to_string(),
            id: "t1".to_string(),
            params: params.map(str::to_string),
        }
    }

    #[test]
    fn test_cli_resolve_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_recipe(&config.recipe_dir, "web/nginx.recipe", "pkg: nginx\n");

        let cmd = Commands::Resolve {
            recipe: "web.nginx".to_string(),
            root: None,
        };
        assert!(run(&config, cmd).is_ok());

        let cmd = Commands::Render {
            recipe: "web.nginx".to_string(),
            root: None,
        };
        assert!(run(&config, cmd).is_ok());
    }

    #[test]
    fn test_cli_root_override() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let other = dir.path().join("elsewhere");
        write_recipe(&other, "base.recipe", "a: 1\n");

        let cmd = Commands::Resolve {
            recipe: "base".to_string(),
            root: None,
        };
        assert!(run(&config, cmd).is_err());

        let cmd = Commands::Resolve {
            recipe: "base".to_string(),
            root: Some(other),
        };
        assert!(run(&config, cmd).is_ok());
    }

    #[test]
    fn test_cli_resolve_missing_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        std::fs::create_dir_all(&config.recipe_dir).unwrap();
        let err = cmd_resolve(&book(&config, None), "nope").unwrap_err();
        assert!(err.contains("nope.recipe"), "{}", err);
    }

    #[test]
    fn test_cli_includes_closure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_recipe(&config.recipe_dir, "a.recipe", "includes: [b]\n");
        write_recipe(&config.recipe_dir, "b.recipe", "includes: [a]\n");

        let cmd = Commands::Includes {
            recipes: vec!["a".to_string()],
            root: None,
        };
        assert!(run(&config, cmd).is_ok());
    }

    #[test]
    fn test_cli_render_strict_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_recipe(&config.recipe_dir, "bad.recipe", "x: {{ nope }}\n");
        let err = cmd_render(&book(&config, None), "bad").unwrap_err();
        assert!(err.contains("bad"), "{}", err);
    }

    #[test]
    fn test_cli_methods() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let cmd = Commands::Methods {
            ingredient: "file".to_string(),
            method: None,
        };
        assert!(run(&config, cmd).is_ok());

        let cmd = Commands::Methods {
            ingredient: "file".to_string(),
            method: Some("cached".to_string()),
        };
        assert!(run(&config, cmd).is_ok());

        let cmd = Commands::Methods {
            ingredient: "pkg".to_string(),
            method: None,
        };
        assert!(run(&config, cmd).is_err());
    }

    #[test]
    fn test_cli_parse_params() {
        assert!(parse_params(None).unwrap().is_empty());
        assert!(parse_params(Some("  ")).unwrap().is_empty());
        let p = parse_params(Some("name: /tmp/x\nrecurse: true")).unwrap();
        assert_eq!(p.len(), 2);
        assert!(parse_params(Some("[1, 2]")).is_err());
    }

    #[test]
    fn test_cli_step_test_then_apply() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let target = dir.path().join("doomed");
        std::fs::write(&target, "x").unwrap();
        let params = format!("name: {}", target.display());

        assert!(run(&config, Commands::Test(step("file", "absent", Some(&params)))).is_ok());
        assert!(target.exists());
        assert!(run(&config, Commands::Apply(step("file", "absent", Some(&params)))).is_ok());
        assert!(!target.exists());
    }

    #[test]
    fn test_cli_step_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let err = run(&config, Commands::Apply(step("file", "absent", Some("name: /")))).unwrap_err();
        assert!(err.contains("root"), "{}", err);

        let missing = format!("name: {}", dir.path().join("none").display());
        assert!(run(&config, Commands::Test(step("file", "exists", Some(&missing)))).is_err());

        assert!(run(&config, Commands::Test(step("pkg", "installed", None))).is_err());
    }

    #[test]
    fn test_cli_cook_steps_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let made = dir.path().join("made");
        let steps = dir.path().join("steps.yaml");
        std::fs::write(
            &steps,
            format!(
                "- id: mk\n  ingredient: file\n  method: directory\n  params:\n    name: {}\n",
                made.display()
            ),
        )
        .unwrap();

        let cmd = Commands::Cook {
            steps: steps.clone(),
            apply: false,
        };
        assert!(run(&config, cmd).is_ok());
        assert!(!made.exists());

        let cmd = Commands::Cook { steps, apply: true };
        assert!(run(&config, cmd).is_ok());
        assert!(made.is_dir());
    }

    #[test]
    fn test_cli_cook_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let steps = dir.path().join("steps.yaml");
        std::fs::write(
            &steps,
            "- id: bad\n  ingredient: file\n  method: absent\n  params:\n    name: /\n",
        )
        .unwrap();
        let err = cmd_cook(&config, &steps, CookMode::Apply).unwrap_err();
        assert_eq!(err, "1 step(s) failed");

        let err = cmd_cook(&config, &dir.path().join("none.yaml"), CookMode::Test).unwrap_err();
        assert!(err.contains("cannot read"), "{}", err);
    }

    #[test]
    fn test_cli_dispatch_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let recipes = dir.path().join("recipes");
        write_recipe(&recipes, "base.recipe", "a: 1\n");
        let config_path = dir.path().join("farmhand.yaml");
        std::fs::write(
            &config_path,
            format!(
                "recipe_dir: {}\ncache_dir: {}\n",
                recipes.display(),
                dir.path().join("cache").display()
            ),
        )
        .unwrap();

        let cmd = Commands::Resolve {
            recipe: "base".to_string(),
            root: None,
        };
        assert!(dispatch(Some(&config_path), cmd).is_ok());

        let cmd = Commands::Resolve {
            recipe: "base".to_string(),
            root: None,
        };
        let err = dispatch(Some(&dir.path().join("missing.yaml")), cmd).unwrap_err();
        assert!(err.contains("cannot read config"), "{}", err);
    }
}
