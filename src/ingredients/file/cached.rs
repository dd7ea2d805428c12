//! `file.cached`: fetch an artifact into the content-addressed cache.

use super::File;
use crate::core::cooker::{CookContext, CookMode};
use crate::core::error::CookError;
use crate::core::types::CookResult;

pub(super) fn cached(file: &File, mode: CookMode, ctx: &CookContext) -> Result<CookResult, CookError> {
    let reader = file.reader();
    let source = reader.required_str("source", CookError::MissingSource)?;
    let skip_verify = reader.flag("skip_verify")?;
    let hash = match reader.optional_str("hash")? {
        _ if skip_verify => None,
        Some(h) if !h.is_empty() => Some(h),
        _ => return Err(CookError::MissingHash),
    };

    let entry = file.cache.entry(source, hash)?;
    let path = entry.path.display();

    if file.cache.is_valid(&entry, ctx)? {
        return Ok(CookResult::success(false).with_note(format!("{source} is cached at {path}")));
    }
    if mode.is_test() {
        return Ok(CookResult::success(true).with_note(format!("would download {source} to {path}")));
    }

    let downloaded = file.cache.fetch(&entry, ctx)?;
    let note = if downloaded {
        format!("downloaded {source} to {path}")
    } else {
        format!("{source} is cached at {path}")
    };
    Ok(CookResult::success(downloaded).with_note(note))
}
