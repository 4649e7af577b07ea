//! Error types for manifest rendering

use crate::patch::PatchError;
use crate::variables::VariableError;
use thiserror::Error;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised while building ops or rendering a manifest
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Variables(#[from] VariableError),

    #[error("failed to serialize rendered manifest: {0}")]
    Serialize(String),
}

impl RenderError {
    pub(crate) fn parse(what: &'static str, err: impl std::fmt::Display) -> Self {
        RenderError::Parse {
            what,
            message: err.to_string(),
        }
    }
}
