//! Persistence layer.
//!
//! Loads and saves the account snapshot as pretty-printed JSON. Saves go
//! through a uniquely named sibling temp file and a rename, so readers
//! only ever see the previous snapshot or the complete new one.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::Snapshot;

/// Save the snapshot, atomically replacing whatever is at `path`.
pub fn save_snapshot(snapshot: &Snapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialise snapshot")?;

    let tmp = temp_path_for(path);
    fs::write(&tmp, &json)
        .with_context(|| format!("Failed to write snapshot to {}", tmp.display()))?;

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace snapshot {}", path.display()));
    }

    debug!(path = %path.display(), total_users = snapshot.total_users, "Snapshot saved");
    Ok(())
}

/// Load the snapshot at `path`.
/// Returns `None` if the file doesn't exist (fresh start).
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        info!(path = %path.display(), "No saved snapshot found, starting fresh");
        return Ok(None);
    }

    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;

    let snapshot: Snapshot = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse snapshot from {}", path.display()))?;

    if snapshot.total_users != snapshot.users.len() {
        warn!(
            path = %path.display(),
            total_users = snapshot.total_users,
            actual = snapshot.users.len(),
            "Snapshot count mismatch, trusting the user list"
        );
    }

    info!(
        path = %path.display(),
        users = snapshot.users.len(),
        updated_at = %snapshot.updated_at,
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
