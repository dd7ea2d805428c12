//! Content-addressed artifact cache.
//!
//! A flat directory of fetched artifacts. Verified entries are named by their
//! `hash` parameter; unverified ones by `skip_<basename>` of their source.
//! Downloads land in a temp file, are checked, then renamed into place, so a
//! cache path only ever holds a complete artifact.

pub mod fetch;
pub mod hasher;

use crate::core::cooker::CookContext;
use crate::core::error::{CacheError, CookError, FetchError};
use dashmap::{DashMap, DashSet};
use fetch::{Fetcher, HttpFetcher};
use hasher::{hash_file, Digest};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Prefix of cache entries stored without verification.
pub const SKIP_PREFIX: &str = "skip_";

/// One resolved cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub source: Url,
    /// `None` when verification was explicitly skipped.
    pub digest: Option<Digest>,
    pub path: PathBuf,
}

/// The cache directory plus the transport used to fill it.
pub struct CacheStore {
    dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    in_flight: DashMap<PathBuf, Arc<Mutex<()>>>,
    verified: DashSet<PathBuf>,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
            in_flight: DashMap::new(),
            verified: DashSet::new(),
        }
    }

    /// Store backed by the HTTP/file transport.
    pub fn with_http(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(timeout)?;
        Ok(Self::new(dir, Arc::new(fetcher)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve the cache slot for a source. `hash` of `None` means
    /// verification is skipped.
    pub fn entry(&self, source: &str, hash: Option<&str>) -> Result<CacheEntry, CacheError> {
        let url = Url::parse(source).map_err(|_| CacheError::InvalidSource(source.to_string()))?;
        let (digest, file_name) = match hash {
            Some(raw) => {
                let digest = Digest::parse(raw)?;
                if !digest.has_full_length() {
                    warn!(
                        hash = raw,
                        expected_len = digest.algorithm().hex_len(),
                        "hash is shorter or longer than a full digest and can never verify"
                    );
                }
                let name = digest.as_str().to_string();
                (Some(digest), name)
            }
            None => {
                let base = url
                    .path_segments()
                    .and_then(|mut segs| segs.next_back())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| CacheError::InvalidSource(source.to_string()))?;
                (None, format!("{SKIP_PREFIX}{base}"))
            }
        };
        Ok(CacheEntry {
            source: url,
            digest,
            path: self.dir.join(file_name),
        })
    }

    /// Whether the entry is present and, unless skipped, matches its digest.
    /// A missing file is simply not valid yet.
    pub fn is_valid(&self, entry: &CacheEntry, ctx: &CookContext) -> Result<bool, CookError> {
        if self.verified.contains(&entry.path) {
            return Ok(true);
        }
        match std::fs::metadata(&entry.path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(CacheError::Io {
                    path: entry.path.clone(),
                    source,
                }
                .into())
            }
        }

        let valid = match &entry.digest {
            None => true,
            Some(digest) => {
                let actual = hash_file(&entry.path, digest.algorithm(), ctx)?;
                let ok = digest.matches(&actual);
                if !ok {
                    warn!(path = %entry.path.display(), expected = %digest, actual = %actual, "cached artifact does not match its hash");
                }
                ok
            }
        };
        if valid {
            self.verified.insert(entry.path.clone());
        }
        Ok(valid)
    }

    /// Make the entry valid, downloading if needed. Returns whether a
    /// download happened. Only one download per cache path runs at a time;
    /// later callers find the artifact already in place.
    pub fn fetch(&self, entry: &CacheEntry, ctx: &CookContext) -> Result<bool, CookError> {
        let lock = Arc::clone(
            self.in_flight
                .entry(entry.path.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let result = {
            let _guard = lock.lock();
            self.fetch_locked(entry, ctx)
        };
        drop(lock);
        // Only the map holds the lock once nobody else is waiting on it.
        self.in_flight
            .remove_if(&entry.path, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn fetch_locked(&self, entry: &CacheEntry, ctx: &CookContext) -> Result<bool, CookError> {
        if self.is_valid(entry, ctx)? {
            debug!(path = %entry.path.display(), "cache hit");
            return Ok(false);
        }

        let io_err = |path: &Path, source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&self.dir)
            .map_err(|e| io_err(&self.dir, e))?;

        info!(url = %entry.source, path = %entry.path.display(), "downloading");
        let written = self
            .fetcher
            .fetch(&entry.source, temp.as_file_mut(), ctx)
            .map_err(|err| download_error(&entry.source, temp.path(), err))?;
        temp.as_file_mut()
            .flush()
            .map_err(|e| io_err(temp.path(), e))?;

        if let Some(digest) = &entry.digest {
            let actual = hash_file(temp.path(), digest.algorithm(), ctx)?;
            if !digest.matches(&actual) {
                // dropping `temp` removes the partial file
                return Err(CacheError::Verification {
                    path: entry.path.clone(),
                    expected: digest.hex().to_string(),
                    actual,
                }
                .into());
            }
        }

        temp.persist(&entry.path)
            .map_err(|e| io_err(&entry.path, e.error))?;
        self.verified.insert(entry.path.clone());
        info!(path = %entry.path.display(), bytes = written, "cached artifact stored");
        Ok(true)
    }
}

/// Cancellation stays a cancellation and a refused write to the temp file is
/// cache I/O. Anything else is a download failure.
fn download_error(source: &Url, temp: &Path, err: FetchError) -> CookError {
    match err {
        FetchError::Interrupted(interrupt) => CookError::Interrupted(interrupt),
        FetchError::Write(io) => CacheError::Io {
            path: temp.to_path_buf(),
            source: io,
        }
        .into(),
        other => CacheError::Download {
            url: source.to_string(),
            source: other,
        }
        .into(),
    }
}
