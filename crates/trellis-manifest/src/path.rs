//! Ops paths
//!
//! A path is a `/`-separated list of segments with JSON-pointer escaping
//! (`~1` is `/`, `~0` is `~`). Besides plain keys and indexes a segment can be
//! `-` (append to a sequence) or a `key=value` selector that picks the single
//! mapping element of a sequence whose `key` field equals `value`:
//!
//! ```text
//! /instance_groups/name=api/jobs/name=nats/properties/port
//! /instance_groups/-
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must start with '/'")]
    NotAbsolute,

    #[error("path must name at least one segment")]
    Empty,

    #[error("segment {position} is empty")]
    EmptySegment { position: usize },

    #[error("optional segment '{segment}' is not supported")]
    Optional { segment: String },

    #[error("selector '{segment}' needs a non-empty key")]
    InvalidSelector { segment: String },
}

/// One path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Mapping key, or sequence index when resolved against a sequence
    Key(String),
    /// `-`, the position past the end of a sequence
    Append,
    /// `key=value` selector over sequence elements
    Select { key: String, value: String },
}

impl PathToken {
    fn parse(raw: &str, position: usize) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::EmptySegment { position });
        }
        if raw.ends_with('?') {
            return Err(PathError::Optional {
                segment: raw.to_string(),
            });
        }
        if raw == "-" {
            return Ok(PathToken::Append);
        }

        let segment = raw.replace("~1", "/").replace("~0", "~");
        match segment.split_once('=') {
            Some(("", _)) => Err(PathError::InvalidSelector {
                segment: raw.to_string(),
            }),
            Some((key, value)) => Ok(PathToken::Select {
                key: key.to_string(),
                value: value.to_string(),
            }),
            None => Ok(PathToken::Key(segment)),
        }
    }
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Key(key) => f.write_str(&escape(key)),
            PathToken::Append => f.write_str("-"),
            PathToken::Select { key, value } => write!(f, "{}={}", escape(key), escape(value)),
        }
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A parsed ops path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpsPath {
    raw: String,
    tokens: Vec<PathToken>,
}

impl OpsPath {
    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for OpsPath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let rest = raw.strip_prefix('/').ok_or(PathError::NotAbsolute)?;
        if rest.is_empty() {
            return Err(PathError::Empty);
        }

        let tokens = rest
            .split('/')
            .enumerate()
            .map(|(position, segment)| PathToken::parse(segment, position))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }
}

impl TryFrom<String> for OpsPath {
    type Error = PathError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<OpsPath> for String {
    fn from(path: OpsPath) -> Self {
        path.raw
    }
}

impl fmt::Display for OpsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
