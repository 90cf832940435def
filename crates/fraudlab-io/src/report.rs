use crate::error::{IoError, IoResult};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Serialize any report value as pretty-printed JSON at `path`.
pub fn write_json_report<S: Serialize, P: AsRef<Path>>(path: P, report: &S) -> IoResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|source| IoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "report written");
    Ok(())
}
