//! Error types for trellisd

use std::path::PathBuf;
use thiserror::Error;
use trellis_manifest::RenderError;

/// Daemon errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An input file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file is not valid YAML for what it should contain
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Rendering failed
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("instance group '{0}' not found in manifest")]
    UnknownInstanceGroup(String),

    #[error("instance group '{group}' has no job '{job}'")]
    UnknownJob { group: String, job: String },

    /// Output could not be serialized
    #[error("failed to serialize output: {0}")]
    Serialize(String),
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Read a whole file.
pub(crate) fn read(path: &std::path::Path) -> DaemonResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| DaemonError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a YAML file into `T`.
pub(crate) fn read_yaml<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> DaemonResult<T> {
    let bytes = read(path)?;
    serde_yaml::from_slice(&bytes).map_err(|e| DaemonError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_names_path() {
        let err = read(std::path::Path::new("/nonexistent/manifest.yml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/manifest.yml"));
    }
}
