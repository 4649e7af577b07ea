//! Object metadata

use crate::ids::ObjectKey;
use crate::labels::{ANNOTATION_CONSUMED_BY, ANNOTATION_LAST_RECONCILE, LABEL_DEPLOYMENT_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata carried by every cluster object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name
    pub name: String,

    /// Namespace the object lives in
    #[serde(default)]
    pub namespace: String,

    /// Labels (ordered for deterministic output)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations (ordered for deterministic output)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Optimistic concurrency token, bumped by the store on every write
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Objects without a namespace and a name carry no scope.
    pub fn is_scoped(&self) -> bool {
        !self.namespace.is_empty() && !self.name.is_empty()
    }

    /// Deployments this object declares itself as belonging to.
    ///
    /// Collected from the deployment-name label and the consumed-by
    /// annotation, deduplicated and sorted.
    pub fn declared_deployments(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .label(LABEL_DEPLOYMENT_NAME)
            .into_iter()
            .chain(
                self.annotation(ANNOTATION_CONSUMED_BY)
                    .into_iter()
                    .flat_map(|v| v.split(',')),
            )
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Raw value of the last-reconcile annotation, parsed.
    ///
    /// `None` when absent; `Some(Err)` when present but not RFC 3339.
    pub fn last_reconcile(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        self.annotation(ANNOTATION_LAST_RECONCILE).map(|raw| {
            DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
        })
    }

    /// Stamp the last-reconcile annotation.
    pub fn stamp_last_reconcile(&mut self, at: DateTime<Utc>) {
        self.annotations
            .insert(ANNOTATION_LAST_RECONCILE.to_string(), at.to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_deployments_merges_label_and_annotation() {
        let meta = ObjectMeta::new("fleet", "ops")
            .with_label(LABEL_DEPLOYMENT_NAME, "d1")
            .with_annotation(ANNOTATION_CONSUMED_BY, "d2, d1,,d3");
        assert_eq!(meta.declared_deployments(), vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn test_unlabeled_object_declares_nothing() {
        assert!(ObjectMeta::new("fleet", "ops").declared_deployments().is_empty());
    }

    #[test]
    fn test_last_reconcile_round_trip() {
        let mut meta = ObjectMeta::new("fleet", "bpm");
        assert!(meta.last_reconcile().is_none());

        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        meta.stamp_last_reconcile(at);
        assert_eq!(meta.last_reconcile().unwrap().unwrap(), at);
    }

    #[test]
    fn test_last_reconcile_garbage() {
        let meta =
            ObjectMeta::new("fleet", "bpm").with_annotation(ANNOTATION_LAST_RECONCILE, "yesterday");
        assert!(meta.last_reconcile().unwrap().is_err());
    }

    #[test]
    fn test_scope() {
        assert!(ObjectMeta::new("fleet", "x").is_scoped());
        assert!(!ObjectMeta::new("", "x").is_scoped());
    }
}
