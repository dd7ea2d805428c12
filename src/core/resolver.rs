//! Recipe resolution. Maps a dotted recipe name to a file under the recipe root.
//!
//! `web.nginx.config` under root `R` resolves to `R/web/nginx/config.recipe`.
//! Every directory on the way must exist and be a directory; the leaf must
//! exist and must not be a directory.

use super::error::RecipeError;
use super::types::RecipeName;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed extension of recipe documents.
pub const RECIPE_EXT: &str = "recipe";

/// Resolve a recipe name to the absolute path of its document.
pub fn resolve_recipe_path(base: &Path, name: &RecipeName) -> Result<PathBuf, RecipeError> {
    let base = strip_recipe_ext(base);
    if base.as_os_str().is_empty() {
        return Err(RecipeError::EmptyBasePath);
    }

    let segments = validate_segments(name)?;
    let Some((leaf, dirs)) = segments.split_last() else {
        return Err(RecipeError::InvalidRecipeName(name.to_string()));
    };

    let mut current = std::path::absolute(&base).map_err(|source| RecipeError::Io {
        path: base.clone(),
        source,
    })?;
    ensure_directory(&current)?;
    for dir in dirs {
        current.push(dir);
        ensure_directory(&current)?;
    }

    let file = current.join(format!("{}.{}", leaf, RECIPE_EXT));
    match std::fs::metadata(&file) {
        Ok(meta) if meta.is_dir() => Err(RecipeError::IsADirectory(file)),
        Ok(_) => {
            debug!(recipe = %name, path = %file.display(), "resolved recipe");
            Ok(file)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RecipeError::NotFound(file)),
        Err(source) => Err(RecipeError::Io { path: file, source }),
    }
}

/// Drop a trailing `.recipe` mistakenly left on the base path.
fn strip_recipe_ext(base: &Path) -> PathBuf {
    if base.extension() == Some(OsStr::new(RECIPE_EXT)) {
        base.with_extension("")
    } else {
        base.to_path_buf()
    }
}

fn validate_segments(name: &RecipeName) -> Result<Vec<&str>, RecipeError> {
    let segments: Vec<&str> = name.segments().collect();
    let bad = segments
        .iter()
        .any(|s| s.is_empty() || s.contains('/') || s.contains('\\'));
    if bad {
        return Err(RecipeError::InvalidRecipeName(name.to_string()));
    }
    Ok(segments)
}

fn ensure_directory(path: &Path) -> Result<(), RecipeError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RecipeError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RecipeError::NotADirectory(path.to_path_buf()))
        }
        Err(source) => Err(RecipeError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
