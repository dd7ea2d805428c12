//! Error types for recipe loading, cooking, caching and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, rendering or parsing recipes.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("recipe root is not configured")]
    EmptyBasePath,

    #[error("invalid recipe name '{0}': segments must be non-empty and contain no path separators")]
    InvalidRecipeName(String),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("recipe file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} is a directory, expected a recipe file", .0.display())]
    IsADirectory(PathBuf),

    #[error("cannot read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render recipe '{name}'")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to parse recipe '{name}'")]
    Parse {
        name: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("recipe '{name}' must be a mapping, but found {found}")]
    NotAMapping { name: String, found: &'static str },

    #[error("recipe '{name}' has a non-string top-level key of type {found}")]
    NonStringKey { name: String, found: &'static str },

    #[error("includes must be a list of strings, but found {found}")]
    InvalidIncludes { found: &'static str },
}

/// Cancellation classification for long-running cook operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Errors raised by a transport while fetching a cache source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unsupported source scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("transfer I/O error")]
    Io(#[from] std::io::Error),

    /// The destination refused the bytes; the transfer itself was fine.
    #[error("failed to write fetched bytes")]
    Write(#[source] std::io::Error),

    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

/// Failures of the content-addressed cache.
///
/// `Download` means the transfer itself failed; `Io` means the cache's own
/// bookkeeping (temp files, renames, reads) failed.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    Verification {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("cache I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid hash '{0}': expected [sha256:|blake3:]<hex>")]
    InvalidHash(String),

    #[error("invalid cache source '{0}'")]
    InvalidSource(String),
}

/// Errors raised by the registry and by ingredient Test/Apply.
#[derive(Error, Debug)]
pub enum CookError {
    #[error("missing or invalid 'name' parameter")]
    MissingName,

    #[error("missing or invalid 'source' parameter")]
    MissingSource,

    #[error("missing 'hash' parameter (set skip_verify to bypass verification)")]
    MissingHash,

    #[error("refusing to delete the filesystem root")]
    DeleteRoot,

    #[error("refusing to modify the filesystem root")]
    ModifyRoot,

    #[error("'name' must be an absolute path to be changed, got '{0}'")]
    RelativeName(String),

    #[error("parameter '{key}' must be {expected}, but found {found}")]
    InvalidParam {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("parameter '{key}' is not supported by method '{method}' yet")]
    UnsupportedParam { method: String, key: String },

    #[error("unknown ingredient '{0}'")]
    UnknownIngredient(String),

    #[error("unknown method '{method}' for ingredient '{ingredient}'")]
    UnknownMethod { ingredient: String, method: String },

    #[error("method '{ingredient}.{method}' is not implemented")]
    NotImplemented { ingredient: String, method: String },

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("invalid file mode '{0}'")]
    InvalidMode(String),

    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache failure")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Interrupted(#[from] Interrupt),

    #[error("cannot serialize step properties")]
    Properties(#[from] serde_json::Error),
}

impl CookError {
    /// Build an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for cancellation and deadline errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// True when the failure came from resolving a cached artifact.
    pub fn is_cache_failure(&self) -> bool {
        matches!(self, Self::Cache(_))
    }

    /// True for registry lookup failures.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::UnknownIngredient(_) | Self::UnknownMethod { .. })
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Render an error with its full `source()` chain, `: `-separated.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}
