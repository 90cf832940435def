use fraudlab_core::TensorError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing transaction files and reports.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("schema mismatch: {0}")]
    Format(String),

    #[error("cannot encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type IoResult<T> = Result<T, IoError>;
