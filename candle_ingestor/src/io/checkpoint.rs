//! Machine-readable resume point kept next to the CSV store.
//!
//! The CSV's `open_time` column is human-readable; the checkpoint records the
//! next start time in epoch milliseconds so a run does not have to re-parse it.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::io::sink::{CheckpointSnafu, IoSnafu, SinkError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub symbol: String,
    pub interval: String,
    /// Bar duration `next_start_ms` was computed with.
    pub interval_ms: i64,
    /// `open_time` of the last stored row, exactly as written to the store.
    pub last_open_time: String,
    /// Where the next run starts, epoch milliseconds.
    pub next_start_ms: i64,
}

/// `3min_data.csv` keeps its checkpoint in `3min_data.csv.checkpoint.json`.
pub fn checkpoint_path(store_path: &Path) -> PathBuf {
    let mut name = OsString::from(store_path.as_os_str());
    name.push(".checkpoint.json");
    PathBuf::from(name)
}

/// Reads the checkpoint at `path`; `Ok(None)` when there is none.
pub fn read(path: &Path) -> Result<Option<Checkpoint>, SinkError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).context(IoSnafu { path })?;
    let checkpoint = serde_json::from_str(&content).context(CheckpointSnafu { path })?;
    Ok(Some(checkpoint))
}

/// Replaces the checkpoint at `path` via a temporary file and a rename.
pub fn write(path: &Path, checkpoint: &Checkpoint) -> Result<(), SinkError> {
    let content = serde_json::to_string_pretty(checkpoint).context(CheckpointSnafu { path })?;

    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).context(IoSnafu { path: &tmp })?;
    fs::rename(&tmp, path).context(IoSnafu { path })?;
    Ok(())
}
