//! `file.directory`: ensure a directory exists with the requested owner,
//! group and modes.

use super::{File, Guard};
use crate::core::cooker::{CookContext, CookMode};
use crate::core::error::CookError;
use crate::core::types::{yaml_type_name, CookResult, Note};
use nix::unistd::{chown, Gid, Group, Uid, User};
use serde_yaml_ng::Value;
use std::fs::{self, Metadata, Permissions};
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Options that are declared but not supported; setting them fails loudly.
const UNSUPPORTED_FLAGS: &[&str] = &["clean", "follow_symlinks", "force", "allow_symlink"];

const MAX_MODE: u32 = 0o7777;

/// Fully validated request. Built before anything touches the disk.
struct DirectorySpec {
    path: PathBuf,
    makedirs: bool,
    recurse: bool,
    owner: Option<(String, Uid)>,
    group: Option<(String, Gid)>,
    dir_mode: Option<u32>,
    file_mode: Option<u32>,
}

impl DirectorySpec {
    fn from_step(file: &File) -> Result<Self, CookError> {
        let path = file.target(Guard::Modify)?;
        let reader = file.reader();
        let method = file.method().as_str();

        for key in UNSUPPORTED_FLAGS {
            if reader.flag(key)? {
                return Err(CookError::UnsupportedParam {
                    method: method.to_string(),
                    key: key.to_string(),
                });
            }
        }
        if reader.optional_str("backupname")?.is_some_and(|s| !s.is_empty()) {
            return Err(CookError::UnsupportedParam {
                method: method.to_string(),
                key: "backupname".to_string(),
            });
        }

        let owner = match reader.optional_str("user")? {
            Some(name) => Some((name.to_string(), lookup_user(name, &path)?)),
            None => None,
        };
        let group = match reader.optional_str("group")? {
            Some(name) => Some((name.to_string(), lookup_group(name, &path)?)),
            None => None,
        };

        Ok(Self {
            makedirs: reader.optional_bool("makedirs")?.unwrap_or(true),
            recurse: reader.flag("recurse")?,
            owner,
            group,
            dir_mode: parse_mode(reader.raw("dir_mode"), "dir_mode")?,
            file_mode: parse_mode(reader.raw("file_mode"), "file_mode")?,
            path,
        })
    }

    fn has_attributes(&self) -> bool {
        self.owner.is_some()
            || self.group.is_some()
            || self.dir_mode.is_some()
            || self.file_mode.is_some()
    }
}

fn lookup_user(name: &str, path: &Path) -> Result<Uid, CookError> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid),
        Ok(None) => Err(CookError::UnknownUser(name.to_string())),
        Err(errno) => Err(CookError::io(path, errno.into())),
    }
}

fn lookup_group(name: &str, path: &Path) -> Result<Gid, CookError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid),
        Ok(None) => Err(CookError::UnknownGroup(name.to_string())),
        Err(errno) => Err(CookError::io(path, errno.into())),
    }
}

/// Octal mode from `"0755"`, `"755"`, `"0o755"`, or an unquoted YAML number
/// whose digits are read as octal.
fn parse_mode(value: Option<&Value>, key: &str) -> Result<Option<u32>, CookError> {
    let text = match value {
        None => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) if n.is_u64() => n.to_string(),
        Some(other) => {
            return Err(CookError::InvalidParam {
                key: key.to_string(),
                expected: "string",
                found: yaml_type_name(other),
            })
        }
    };
    let digits = text.strip_prefix("0o").unwrap_or(&text);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if !digits.is_empty() && mode <= MAX_MODE => Ok(Some(mode)),
        _ => Err(CookError::InvalidMode(text)),
    }
}

pub(super) fn directory(
    file: &File,
    mode: CookMode,
    ctx: &CookContext,
) -> Result<CookResult, CookError> {
    let spec = DirectorySpec::from_step(file)?;
    let test = mode.is_test();
    let mut notes: Vec<Note> = Vec::new();

    let exists = match fs::metadata(&spec.path) {
        Ok(meta) if meta.is_dir() => true,
        Ok(_) => return Err(CookError::NotADirectory(spec.path.clone())),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(CookError::io(&spec.path, e)),
    };

    if !exists {
        if !spec.makedirs {
            require_parent(&spec.path)?;
        }
        if test {
            notes.push(format!("would create directory {}", spec.path.display()).into());
            if spec.has_attributes() {
                notes.push(
                    format!("would set ownership and modes on {}", spec.path.display()).into(),
                );
            }
            return Ok(CookResult::success(true).with_notes(notes));
        }
        ctx.check()?;
        fs::DirBuilder::new()
            .recursive(spec.makedirs)
            .mode(0o755)
            .create(&spec.path)
            .map_err(|e| CookError::io(&spec.path, e))?;
        notes.push(format!("created directory {}", spec.path.display()).into());
    }

    converge_tree(&spec, test, ctx, &mut notes)?;

    let changed = !notes.is_empty();
    if !changed {
        notes.push(format!("directory {} is in the desired state", spec.path.display()).into());
    }
    Ok(CookResult::success(changed).with_notes(notes))
}

/// Without `makedirs` only the leaf is created, so its parent must already
/// be a directory. Test and Apply both fail here before anything is touched.
fn require_parent(path: &Path) -> Result<(), CookError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    match fs::metadata(parent) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CookError::NotADirectory(parent.to_path_buf())),
        Err(e) => Err(CookError::io(parent, e)),
    }
}

/// Walk the directory (or its first level without `recurse`) and fix every
/// attribute that differs. Symlinks are left alone.
fn converge_tree(
    spec: &DirectorySpec,
    test: bool,
    ctx: &CookContext,
    notes: &mut Vec<Note>,
) -> Result<(), CookError> {
    if !spec.has_attributes() {
        return Ok(());
    }
    let max_depth = if spec.recurse { usize::MAX } else { 1 };
    for entry in WalkDir::new(&spec.path).follow_links(false).max_depth(max_depth) {
        ctx.check()?;
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&spec.path).to_path_buf();
            CookError::io(path, e.into())
        })?;
        let ft = entry.file_type();
        if ft.is_symlink() {
            continue;
        }
        let is_root = entry.depth() == 0;
        let meta = entry
            .metadata()
            .map_err(|e| CookError::io(entry.path(), e.into()))?;

        let (chown_applies, mode) = if ft.is_dir() {
            (is_root || spec.recurse, if is_root || spec.recurse { spec.dir_mode } else { None })
        } else if ft.is_file() {
            (spec.recurse, spec.file_mode)
        } else {
            (spec.recurse, None)
        };

        if chown_applies {
            converge_owner(entry.path(), &meta, spec, test, notes)?;
        }
        if let Some(mode) = mode {
            converge_mode(entry.path(), &meta, mode, test, notes)?;
        }
    }
    Ok(())
}

fn converge_owner(
    path: &Path,
    meta: &Metadata,
    spec: &DirectorySpec,
    test: bool,
    notes: &mut Vec<Note>,
) -> Result<(), CookError> {
    let uid = spec
        .owner
        .as_ref()
        .filter(|(_, uid)| uid.as_raw() != meta.uid());
    let gid = spec
        .group
        .as_ref()
        .filter(|(_, gid)| gid.as_raw() != meta.gid());
    if uid.is_none() && gid.is_none() {
        return Ok(());
    }

    let verb = if test { "would change" } else { "changed" };
    if let Some((name, _)) = uid {
        notes.push(format!("{verb} owner of {} to {name}", path.display()).into());
    }
    if let Some((name, _)) = gid {
        notes.push(format!("{verb} group of {} to {name}", path.display()).into());
    }
    if !test {
        chown(path, uid.map(|(_, u)| *u), gid.map(|(_, g)| *g))
            .map_err(|errno| CookError::io(path, errno.into()))?;
    }
    Ok(())
}

fn converge_mode(
    path: &Path,
    meta: &Metadata,
    mode: u32,
    test: bool,
    notes: &mut Vec<Note>,
) -> Result<(), CookError> {
    if meta.mode() & MAX_MODE == mode {
        return Ok(());
    }
    let verb = if test { "would change" } else { "changed" };
    notes.push(format!("{verb} mode of {} to {mode:04o}", path.display()).into());
    if !test {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|e| CookError::io(path, e))?;
    }
    Ok(())
}
