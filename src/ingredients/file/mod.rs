//! The `file` ingredient.
//!
//! `absent`, `exists`, `missing`, `directory` and `cached` converge real
//! state. The remaining methods keep their documented schema but report
//! `NotImplemented` after validating their target.

mod cached;
mod directory;
pub mod subset;

use crate::cache::CacheStore;
use crate::core::cooker::{
    method_props, params_to_properties, CookContext, CookMode, Cooker, Ingredient, MethodProps,
    PropSpec,
    PropType::{Bool, String as Str, StringList},
};
use crate::core::error::CookError;
use crate::core::params::ParamReader;
use crate::core::types::{CookResult, Params, StepId};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

pub const INGREDIENT: &str = "file";

/// Methods in declaration order.
pub const METHOD_NAMES: &[&str] = &[
    "absent",
    "append",
    "cached",
    "contains",
    "content",
    "directory",
    "managed",
    "missing",
    "prepend",
    "exists",
    "symlink",
    "touch",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMethod {
    Absent,
    Append,
    Cached,
    Contains,
    Content,
    Directory,
    Managed,
    Missing,
    Prepend,
    Exists,
    Symlink,
    Touch,
}

impl FileMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            FileMethod::Absent => "absent",
            FileMethod::Append => "append",
            FileMethod::Cached => "cached",
            FileMethod::Contains => "contains",
            FileMethod::Content => "content",
            FileMethod::Directory => "directory",
            FileMethod::Managed => "managed",
            FileMethod::Missing => "missing",
            FileMethod::Prepend => "prepend",
            FileMethod::Exists => "exists",
            FileMethod::Symlink => "symlink",
            FileMethod::Touch => "touch",
        }
    }

    /// Documented parameters.
    pub fn schema(self) -> &'static [PropSpec] {
        match self {
            FileMethod::Absent | FileMethod::Missing | FileMethod::Exists => NAME_ONLY,
            FileMethod::Append | FileMethod::Prepend => APPEND,
            FileMethod::Cached => CACHED,
            FileMethod::Contains => CONTAINS,
            FileMethod::Content => CONTENT,
            FileMethod::Directory => DIRECTORY,
            FileMethod::Managed => MANAGED,
            FileMethod::Symlink => SYMLINK,
            FileMethod::Touch => TOUCH,
        }
    }
}

const NAME: PropSpec = PropSpec::req("name", Str);

const NAME_ONLY: &[PropSpec] = &[NAME];

const APPEND: &[PropSpec] = &[
    NAME,
    PropSpec::opt("text", StringList),
    PropSpec::opt("makedirs", Bool),
    PropSpec::opt("source", Str),
    PropSpec::opt("source_hash", Str),
    PropSpec::opt("template", Bool),
    PropSpec::opt("sources", StringList),
    PropSpec::opt("source_hashes", StringList),
];

const CACHED: &[PropSpec] = &[
    PropSpec::req("source", Str),
    PropSpec::opt("hash", Str),
    PropSpec::opt("skip_verify", Bool),
];

const CONTAINS: &[PropSpec] = &[
    NAME,
    PropSpec::opt("text", StringList),
    PropSpec::opt("source", Str),
    PropSpec::opt("source_hash", Str),
    PropSpec::opt("template", Bool),
    PropSpec::opt("sources", StringList),
    PropSpec::opt("source_hashes", StringList),
];

const CONTENT: &[PropSpec] = APPEND;

const DIRECTORY: &[PropSpec] = &[
    NAME,
    PropSpec::opt("user", Str),
    PropSpec::opt("group", Str),
    PropSpec::opt("recurse", Bool),
    PropSpec::opt("dir_mode", Str),
    PropSpec::opt("file_mode", Str),
    PropSpec::opt("makedirs", Bool),
    PropSpec::opt("clean", Bool),
    PropSpec::opt("follow_symlinks", Bool),
    PropSpec::opt("force", Bool),
    PropSpec::opt("backupname", Str),
    PropSpec::opt("allow_symlink", Bool),
];

const MANAGED: &[PropSpec] = &[
    NAME,
    PropSpec::opt("source", Str),
    PropSpec::opt("source_hash", Str),
    PropSpec::opt("user", Str),
    PropSpec::opt("group", Str),
    PropSpec::opt("mode", Str),
    PropSpec::opt("attrs", Str),
    PropSpec::opt("template", Bool),
    PropSpec::opt("makedirs", Bool),
    PropSpec::opt("dir_mode", Str),
    PropSpec::opt("replace", Bool),
    PropSpec::opt("backup", Str),
    PropSpec::opt("show_changes", Bool),
    PropSpec::opt("create", Bool),
    PropSpec::opt("follow_symlinks", Bool),
    PropSpec::opt("skip_verify", Bool),
];

const SYMLINK: &[PropSpec] = &[
    NAME,
    PropSpec::opt("target", Str),
    PropSpec::opt("force", Bool),
    PropSpec::opt("backupname", Str),
    PropSpec::opt("makedirs", Bool),
    PropSpec::opt("user", Str),
    PropSpec::opt("group", Str),
    PropSpec::opt("mode", Str),
];

const TOUCH: &[PropSpec] = &[
    NAME,
    PropSpec::opt("atime", Str),
    PropSpec::opt("mtime", Str),
    PropSpec::opt("makedirs", Bool),
];

impl fmt::Display for FileMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileMethod {
    type Err = CookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "absent" => FileMethod::Absent,
            "append" => FileMethod::Append,
            "cached" => FileMethod::Cached,
            "contains" => FileMethod::Contains,
            "content" => FileMethod::Content,
            "directory" => FileMethod::Directory,
            "managed" => FileMethod::Managed,
            "missing" => FileMethod::Missing,
            "prepend" => FileMethod::Prepend,
            "exists" => FileMethod::Exists,
            "symlink" => FileMethod::Symlink,
            "touch" => FileMethod::Touch,
            other => {
                return Err(CookError::UnknownMethod {
                    ingredient: INGREDIENT.to_string(),
                    method: other.to_string(),
                })
            }
        };
        Ok(method)
    }
}

// ============================================================================
// Prototype
// ============================================================================

/// Registered prototype of the file ingredient.
pub struct FileIngredient {
    cache: Arc<CacheStore>,
}

impl FileIngredient {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }
}

impl Ingredient for FileIngredient {
    fn methods(&self) -> (&'static str, &'static [&'static str]) {
        (INGREDIENT, METHOD_NAMES)
    }

    fn properties_for_method(&self, method: &str) -> Result<MethodProps, CookError> {
        Ok(method_props(method.parse::<FileMethod>()?.schema()))
    }

    fn parse(&self, id: StepId, method: &str, params: Params) -> Result<Box<dyn Cooker>, CookError> {
        Ok(Box::new(File {
            id,
            method: method.parse()?,
            params,
            cache: Arc::clone(&self.cache),
        }))
    }
}

// ============================================================================
// Step-bound cooker
// ============================================================================

/// A file step.
pub struct File {
    id: StepId,
    method: FileMethod,
    params: Params,
    cache: Arc<CacheStore>,
}

/// What a method is about to do to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    Delete,
    Modify,
    Observe,
}

impl File {
    pub(crate) fn method(&self) -> FileMethod {
        self.method
    }

    fn reader(&self) -> ParamReader<'_> {
        ParamReader::new(&self.params)
    }

    /// The cleaned `name` parameter. Anything but observation needs an
    /// absolute path other than the filesystem root; a relative name would
    /// depend on the working directory (`.` and `..` included).
    fn target(&self, guard: Guard) -> Result<PathBuf, CookError> {
        let raw = self.reader().required_str("name", CookError::MissingName)?;
        let cleaned = clean_path(raw);
        if cleaned.is_empty() {
            return Err(CookError::MissingName);
        }
        if guard != Guard::Observe && !cleaned.starts_with('/') {
            return Err(CookError::RelativeName(raw.to_string()));
        }
        if cleaned == "/" {
            match guard {
                Guard::Delete => return Err(CookError::DeleteRoot),
                Guard::Modify => return Err(CookError::ModifyRoot),
                Guard::Observe => {}
            }
        }
        Ok(PathBuf::from(cleaned))
    }

    fn run(&self, mode: CookMode, ctx: &CookContext) -> Result<CookResult, CookError> {
        ctx.check()?;
        debug!(step = %self.id, method = %self.method, %mode, "file step");
        match self.method {
            FileMethod::Absent => self.absent(mode, ctx),
            FileMethod::Exists => self.exists(),
            FileMethod::Missing => self.missing(),
            FileMethod::Directory => directory::directory(self, mode, ctx),
            FileMethod::Cached => cached::cached(self, mode, ctx),
            FileMethod::Append
            | FileMethod::Contains
            | FileMethod::Content
            | FileMethod::Managed
            | FileMethod::Prepend
            | FileMethod::Symlink
            | FileMethod::Touch => self.not_implemented(),
        }
    }

    fn absent(&self, mode: CookMode, ctx: &CookContext) -> Result<CookResult, CookError> {
        let path = self.target(Guard::Delete)?;
        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(CookResult::success(false)
                    .with_note(format!("{} is already absent", path.display())));
            }
            Err(e) => return Err(CookError::io(path, e)),
        };

        if mode.is_test() {
            return Ok(CookResult::success(true)
                .with_note(format!("{} would be deleted", path.display())));
        }

        ctx.check()?;
        if meta.is_dir() {
            remove_tree(&path, ctx)?;
        } else {
            std::fs::remove_file(&path).map_err(|e| CookError::io(&path, e))?;
        }
        Ok(CookResult::success(true).with_note(format!("{} has been deleted", path.display())))
    }

    fn exists(&self) -> Result<CookResult, CookError> {
        let path = self.target(Guard::Observe)?;
        match std::fs::metadata(&path) {
            Ok(_) => Ok(CookResult::success(false).with_note(format!("{} exists", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(CookResult::failure().with_note(format!("{} does not exist", path.display())))
            }
            Err(e) => Err(CookError::io(path, e)),
        }
    }

    fn missing(&self) -> Result<CookResult, CookError> {
        let path = self.target(Guard::Observe)?;
        match std::fs::metadata(&path) {
            Ok(_) => Ok(CookResult::failure()
                .with_note(format!("{} exists but should be missing", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(CookResult::success(false).with_note(format!("{} is missing", path.display())))
            }
            Err(e) => Err(CookError::io(path, e)),
        }
    }

    fn not_implemented(&self) -> Result<CookResult, CookError> {
        self.target(Guard::Modify)?;
        Err(CookError::NotImplemented {
            ingredient: INGREDIENT.to_string(),
            method: self.method.as_str().to_string(),
        })
    }
}

impl Ingredient for File {
    fn methods(&self) -> (&'static str, &'static [&'static str]) {
        (INGREDIENT, METHOD_NAMES)
    }

    fn properties_for_method(&self, method: &str) -> Result<MethodProps, CookError> {
        Ok(method_props(method.parse::<FileMethod>()?.schema()))
    }

    fn parse(&self, id: StepId, method: &str, params: Params) -> Result<Box<dyn Cooker>, CookError> {
        FileIngredient::new(Arc::clone(&self.cache)).parse(id, method, params)
    }
}

impl Cooker for File {
    fn test(&self, ctx: &CookContext) -> Result<CookResult, CookError> {
        self.run(CookMode::Test, ctx)
    }

    fn apply(&self, ctx: &CookContext) -> Result<CookResult, CookError> {
        self.run(CookMode::Apply, ctx)
    }

    fn properties(&self) -> Result<serde_json::Map<String, serde_json::Value>, CookError> {
        params_to_properties(&self.params)
    }
}

/// Remove a directory tree contents-first, checking for cancellation before
/// every entry. Symlinks inside the tree are removed, never followed.
fn remove_tree(root: &Path, ctx: &CookContext) -> Result<(), CookError> {
    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        ctx.check()?;
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            CookError::io(path, e.into())
        })?;
        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        };
        removed.map_err(|e| CookError::io(path, e))?;
    }
    Ok(())
}

/// Lexically clean a slash-separated path: collapse repeated separators,
/// drop `.` segments and resolve `..` against preceding segments. `..` at
/// the root stays at the root. An empty relative result becomes `.`.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
