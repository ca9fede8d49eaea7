//! Error taxonomy for the network engine

use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse classification of an [`EngineError`], used by callers to decide
/// whether to fix the request, retry later, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    CapacityExceeded,
    UpstreamUnavailable,
    InsufficientStructure,
    AlgorithmUnavailable,
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Capacity exceeded: {resource} limit is {limit}, requested {requested}")]
    CapacityExceeded {
        resource: &'static str,
        limit: usize,
        requested: usize,
    },

    #[error("Interaction store unavailable: {0}")]
    UpstreamUnavailable(#[from] StoreError),

    #[error("Insufficient structure: {0}")]
    InsufficientStructure(String),

    #[error("Algorithm {algorithm} unavailable: {reason}")]
    AlgorithmUnavailable {
        algorithm: &'static str,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            EngineError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            EngineError::InsufficientStructure(_) => ErrorKind::InsufficientStructure,
            EngineError::AlgorithmUnavailable { .. } => ErrorKind::AlgorithmUnavailable,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the caller can resolve the failure by changing the request.
    pub fn is_caller_fixable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidInput | ErrorKind::CapacityExceeded
        )
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Oversized { weight, budget } => EngineError::CapacityExceeded {
                resource: "cache bytes",
                limit: budget,
                requested: weight,
            },
            CacheError::Key(e) => EngineError::Internal(format!("cache key: {}", e)),
        }
    }
}
