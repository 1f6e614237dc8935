use thiserror::Error;

use crate::deleter::PipelineError;
use crate::storage::StorageError;

/// Failure kinds shared by the HTTP and RPC fronts.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("short url not found")]
    NotFound,
    #[error("short url has been deleted")]
    Gone,
    #[error("authentication required")]
    Unauthenticated,
    #[error("access denied")]
    Forbidden,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("delete queue is full, try again later")]
    Overloaded,
    #[error("service is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Closed => ServiceError::Unavailable(err.to_string()),
            StorageError::Other(err) => ServiceError::Internal(err),
            other => ServiceError::Internal(other.into()),
        }
    }
}

impl From<PipelineError> for ServiceError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Overloaded => ServiceError::Overloaded,
            PipelineError::ShuttingDown => ServiceError::ShuttingDown,
            other => ServiceError::Internal(other.into()),
        }
    }
}
