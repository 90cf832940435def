use fraudlab_core::TensorError;
use fraudlab_io::IoError;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a pipeline run can fail. The first failure aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input: {0}")]
    Format(String),

    #[error("not enough data: {0}")]
    InsufficientData(String),

    #[error("model {model} failed: {source}")]
    Fit {
        model: String,
        #[source]
        source: TensorError,
    },

    #[error(transparent)]
    Tensor(TensorError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<TensorError> for PipelineError {
    fn from(err: TensorError) -> Self {
        match err {
            TensorError::InsufficientSamples { required, available } => PipelineError::InsufficientData(format!(
                "need at least {} rows, found {}",
                required, available
            )),
            other => PipelineError::Tensor(other),
        }
    }
}

impl From<IoError> for PipelineError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Io { path, source } => PipelineError::Io { path, source },
            IoError::Csv(e) => PipelineError::Format(e.to_string()),
            IoError::Format(msg) => PipelineError::Format(msg),
            IoError::Json(e) => PipelineError::Format(e.to_string()),
            IoError::Tensor(e) => e.into(),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}
