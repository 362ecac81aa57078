//! Environment Factory: a process-wide registry handing out at most one
//! live [`Environment`] per canonicalized queue directory.
//!
//! `heed::EnvOpenOptions::open` is `unsafe` precisely because LMDB forbids
//! two memory maps onto the same file from one process. Rather than push
//! that `unsafe` onto every caller, this module is the sole place in the
//! crate that calls `Environment::open`, guarded by a lock table so a
//! second request for an already-open path gets back the existing handle
//! (or an error, never a second map).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use crate::error::{Error, Result};
use crate::store::{Environment, StoreConfig};

fn registry() -> &'static Mutex<HashMap<PathBuf, Weak<Environment>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Weak<Environment>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the shared `Environment` for `path`, opening it if this is the
/// first request in this process. Every caller holding the returned `Arc`
/// sees the same handle; once the last one drops it, a later call opens a
/// fresh handle rather than reusing a stale one.
pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Arc<Environment>> {
    let canonical = canonicalize(path.as_ref())?;
    let mut table = registry().lock().expect("registry mutex poisoned");

    if let Some(existing) = table.get(&canonical).and_then(Weak::upgrade) {
        return Ok(existing);
    }

    let env = Arc::new(Environment::open(&canonical, config)?);
    table.insert(canonical, Arc::downgrade(&env));
    Ok(env)
}

/// Like [`open`], but fails with `Error::EnvironmentConflict` instead of
/// transparently sharing the existing handle. Used where a caller needs to
/// assert it is the sole owner of a queue directory (spec.md §4.6).
pub fn open_exclusive(path: impl AsRef<Path>, config: StoreConfig) -> Result<Arc<Environment>> {
    let canonical = canonicalize(path.as_ref())?;
    let mut table = registry().lock().expect("registry mutex poisoned");

    if table.get(&canonical).and_then(Weak::upgrade).is_some() {
        return Err(Error::EnvironmentConflict(canonical.display().to_string()));
    }

    let env = Arc::new(Environment::open(&canonical, config)?);
    table.insert(canonical, Arc::downgrade(&env));
    Ok(env)
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    Ok(path.canonicalize()?)
}
