//! Atomic JSON snapshot files.
//!
//! The whole store is written as `{<table>: [<doc>, ...]}` on every
//! mutation. A write goes to `<file>.tmp` first; the current file is moved
//! to `<file>.backup.json`, the temp file is renamed into place and the
//! backup removed. If the final rename fails the backup is moved back so
//! the previous snapshot stays authoritative.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::table::Row;

/// Persisted layout.
pub(crate) type Snapshot = BTreeMap<String, Vec<Row>>;

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Path of the single backup slot for `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".backup.json")
}

fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

/// Load a snapshot, recovering from the backup slot when the main file
/// is missing. Returns an empty snapshot when neither exists.
pub(crate) fn load(path: &Path) -> Result<Snapshot, StoreError> {
    if path.exists() {
        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(Snapshot::new());
        }
        return Ok(serde_json::from_slice(&bytes)?);
    }

    let backup = backup_path(path);
    if backup.exists() {
        warn!(
            path = %path.display(),
            backup = %backup.display(),
            "snapshot missing, recovering from backup"
        );
        let bytes = fs::read(&backup)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        fs::rename(&backup, path)?;
        return Ok(snapshot);
    }

    debug!(path = %path.display(), "no snapshot found, starting empty");
    Ok(Snapshot::new())
}

/// Write `bytes` to `path` through the temp-then-rename protocol.
pub(crate) fn write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    let backup = backup_path(path);

    fs::write(&tmp, bytes)?;

    let had_previous = path.exists();
    if had_previous {
        if let Err(e) = fs::rename(path, &backup) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
    }

    if let Err(e) = fs::rename(&tmp, path) {
        if had_previous {
            if let Err(restore) = fs::rename(&backup, path) {
                warn!(error = %restore, "failed to restore snapshot backup");
            }
        }
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    if had_previous {
        if let Err(e) = fs::remove_file(&backup) {
            warn!(error = %e, backup = %backup.display(), "failed to remove snapshot backup");
        }
    }

    Ok(())
}
