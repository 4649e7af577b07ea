//! Error types for the controller

use thiserror::Error;
use trellis_manifest::RenderError;
use trellis_types::{ObjectKey, ObjectKind};

/// Errors returned by a [`ClusterStore`](crate::store::ClusterStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("cluster store unavailable: {0}")]
    Unavailable(String),

    /// The object changed since it was read
    #[error("conflict writing {key}: expected resource version {expected}, found {found}")]
    Conflict {
        key: ObjectKey,
        expected: u64,
        found: u64,
    },

    /// The object does not exist
    #[error("{kind} {key} not found")]
    NotFound { kind: ObjectKind, key: ObjectKey },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a [`RenderSink`](crate::sink::RenderSink)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to publish rendering of {key}: {reason}")]
pub struct SinkError {
    pub key: ObjectKey,
    pub reason: String,
}

/// Outcome classification of a failed reconcile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Retrying will not help; recorded on the deployment status
    #[error("{0}")]
    Fatal(String),

    /// Retried with backoff
    #[error("{0}")]
    Transient(String),
}

impl ReconcileError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::Fatal(_))
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::Transient(err.to_string())
    }
}

impl From<SinkError> for ReconcileError {
    fn from(err: SinkError) -> Self {
        ReconcileError::Transient(err.to_string())
    }
}

impl From<RenderError> for ReconcileError {
    fn from(err: RenderError) -> Self {
        ReconcileError::Fatal(err.to_string())
    }
}

/// Result type for reconcile operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
