//! Ops patches and the patch engine
//!
//! [`apply`] runs an ordered list of add/remove/replace operations against a
//! document. Every patch sees the output of the previous one, the first
//! failure aborts the whole list, and the input document is never modified.

use crate::path::{OpsPath, PathToken};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use thiserror::Error;

/// Operation performed by a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Add,
    Remove,
    Replace,
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatchKind::Add => "add",
            PatchKind::Remove => "remove",
            PatchKind::Replace => "replace",
        };
        f.write_str(name)
    }
}

/// One structural patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsPatch {
    #[serde(rename = "type")]
    pub kind: PatchKind,

    pub path: OpsPath,

    /// Present (possibly null) whenever the document spelled out a `value` key
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl OpsPatch {
    pub fn add(path: OpsPath, value: Value) -> Self {
        Self {
            kind: PatchKind::Add,
            path,
            value: Some(value),
        }
    }

    pub fn replace(path: OpsPath, value: Value) -> Self {
        Self {
            kind: PatchKind::Replace,
            path,
            value: Some(value),
        }
    }

    pub fn remove(path: OpsPath) -> Self {
        Self {
            kind: PatchKind::Remove,
            path,
            value: None,
        }
    }

    /// Checks the structural contract that does not depend on a document.
    pub fn validate(&self) -> Result<(), PatchErrorKind> {
        match (self.kind, &self.value) {
            (PatchKind::Add | PatchKind::Replace, None) => {
                Err(PatchErrorKind::MissingValue { kind: self.kind })
            }
            _ => Ok(()),
        }
    }
}

/// An ordered list of patches
pub type OpsPatches = Vec<OpsPatch>;

/// Patches applied before rendering, kept apart per target document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreRenderOps {
    /// Applied to process (BPM) configuration documents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bpm: OpsPatches,

    /// Applied to the instance group declaration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_group: OpsPatches,
}

impl PreRenderOps {
    pub fn is_empty(&self) -> bool {
        self.bpm.is_empty() && self.instance_group.is_empty()
    }
}

/// What went wrong while applying a patch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchErrorKind {
    #[error("{kind} requires a value")]
    MissingValue { kind: PatchKind },

    #[error("segment '{segment}' does not exist")]
    NotFound { segment: String },

    #[error("selector '{segment}' matches {count} elements, expected exactly one")]
    AmbiguousSelector { segment: String, count: usize },

    #[error("segment '{segment}' cannot be resolved against a {found}")]
    TypeMismatch {
        segment: String,
        found: &'static str,
    },

    #[error("segment '{segment}' is not a sequence index")]
    NotAnIndex { segment: String },

    #[error("index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("'-' may only end the path of an add")]
    MisplacedAppend,

    #[error("add cannot target selector '{segment}'")]
    SelectorTarget { segment: String },
}

/// A patch failed; no output is produced
#[derive(Debug, Clone, PartialEq, Error)]
#[error("ops patch #{index} ({kind_name} {path}) failed: {kind}")]
pub struct PatchError {
    /// Position of the failing patch in the list
    pub index: usize,
    /// Path of the failing patch
    pub path: String,
    /// Operation of the failing patch
    pub kind_name: PatchKind,
    pub kind: PatchErrorKind,
}

/// Apply `patches` in order to a copy of `document`.
pub fn apply(document: &Value, patches: &[OpsPatch]) -> Result<Value, PatchError> {
    let mut output = document.clone();
    for (index, patch) in patches.iter().enumerate() {
        apply_one(&mut output, patch).map_err(|kind| PatchError {
            index,
            path: patch.path.to_string(),
            kind_name: patch.kind,
            kind,
        })?;
    }
    Ok(output)
}

fn apply_one(document: &mut Value, patch: &OpsPatch) -> Result<(), PatchErrorKind> {
    patch.validate()?;

    let Some((last, parents)) = patch.path.tokens().split_last() else {
        return Ok(());
    };

    let mut parent = document;
    for token in parents {
        parent = child_mut(parent, token)?;
    }

    match patch.kind {
        PatchKind::Add => add(parent, last, value_of(patch)?),
        PatchKind::Replace => replace(parent, last, value_of(patch)?),
        PatchKind::Remove => remove(parent, last),
    }
}

fn value_of(patch: &OpsPatch) -> Result<Value, PatchErrorKind> {
    patch
        .value
        .clone()
        .ok_or(PatchErrorKind::MissingValue { kind: patch.kind })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn mismatch(token: &PathToken, found: &Value) -> PatchErrorKind {
    PatchErrorKind::TypeMismatch {
        segment: token.to_string(),
        found: type_name(found),
    }
}

fn parse_index(segment: &str) -> Result<usize, PatchErrorKind> {
    segment.parse().map_err(|_| PatchErrorKind::NotAnIndex {
        segment: segment.to_string(),
    })
}

/// Textual form of a scalar, used to compare against selector values.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Position of the single element matched by a selector.
fn select(sequence: &[Value], key: &str, value: &str, token: &PathToken) -> Result<usize, PatchErrorKind> {
    let matches: Vec<usize> = sequence
        .iter()
        .enumerate()
        .filter(|(_, element)| {
            element
                .as_mapping()
                .and_then(|m| m.get(key))
                .and_then(scalar_text)
                .is_some_and(|text| text == value)
        })
        .map(|(position, _)| position)
        .collect();

    match matches.as_slice() {
        [position] => Ok(*position),
        [] => Err(PatchErrorKind::NotFound {
            segment: token.to_string(),
        }),
        _ => Err(PatchErrorKind::AmbiguousSelector {
            segment: token.to_string(),
            count: matches.len(),
        }),
    }
}

fn child_mut<'a>(parent: &'a mut Value, token: &PathToken) -> Result<&'a mut Value, PatchErrorKind> {
    let not_found = || PatchErrorKind::NotFound {
        segment: token.to_string(),
    };

    match (token, parent) {
        (PathToken::Append, _) => Err(PatchErrorKind::MisplacedAppend),
        (PathToken::Key(key), Value::Mapping(mapping)) => {
            mapping.get_mut(key.as_str()).ok_or_else(not_found)
        }
        (PathToken::Key(key), Value::Sequence(sequence)) => {
            let index = parse_index(key)?;
            sequence.get_mut(index).ok_or_else(not_found)
        }
        (PathToken::Select { key, value }, Value::Sequence(sequence)) => {
            let position = select(sequence, key, value, token)?;
            Ok(&mut sequence[position])
        }
        (token, other) => Err(mismatch(token, other)),
    }
}

fn add(parent: &mut Value, token: &PathToken, value: Value) -> Result<(), PatchErrorKind> {
    match (token, parent) {
        (PathToken::Key(key), Value::Mapping(mapping)) => {
            mapping.insert(Value::String(key.clone()), value);
            Ok(())
        }
        (PathToken::Key(key), Value::Sequence(sequence)) => {
            let index = parse_index(key)?;
            if index > sequence.len() {
                return Err(PatchErrorKind::IndexOutOfBounds {
                    index,
                    len: sequence.len(),
                });
            }
            sequence.insert(index, value);
            Ok(())
        }
        (PathToken::Append, Value::Sequence(sequence)) => {
            sequence.push(value);
            Ok(())
        }
        (PathToken::Select { .. }, Value::Sequence(_)) => Err(PatchErrorKind::SelectorTarget {
            segment: token.to_string(),
        }),
        (token, other) => Err(mismatch(token, other)),
    }
}

fn replace(parent: &mut Value, token: &PathToken, value: Value) -> Result<(), PatchErrorKind> {
    if *token == PathToken::Append {
        return Err(PatchErrorKind::MisplacedAppend);
    }
    let target = child_mut(parent, token)?;
    *target = value;
    Ok(())
}

fn remove(parent: &mut Value, token: &PathToken) -> Result<(), PatchErrorKind> {
    let not_found = || PatchErrorKind::NotFound {
        segment: token.to_string(),
    };

    match (token, parent) {
        (PathToken::Append, _) => Err(PatchErrorKind::MisplacedAppend),
        (PathToken::Key(key), Value::Mapping(mapping)) => remove_key(mapping, key)
            .map(|_| ())
            .ok_or_else(not_found),
        (PathToken::Key(key), Value::Sequence(sequence)) => {
            let index = parse_index(key)?;
            if index >= sequence.len() {
                return Err(not_found());
            }
            sequence.remove(index);
            Ok(())
        }
        (PathToken::Select { key, value }, Value::Sequence(sequence)) => {
            let position = select(sequence, key, value, token)?;
            sequence.remove(position);
            Ok(())
        }
        (token, other) => Err(mismatch(token, other)),
    }
}

// Keeps the order of the remaining keys.
fn remove_key(mapping: &mut Mapping, key: &str) -> Option<Value> {
    mapping.shift_remove(key)
}
