//! Deployment types
//!
//! A Deployment is the top-level object the controller reconciles. It names
//! the manifest to render, the ordered ops files patched onto it, and the
//! ordered variable sources its placeholders resolve against.

use crate::meta::ObjectMeta;
use crate::ObjectKind;
use serde::{Deserialize, Serialize};

/// A deployment manifest and everything needed to render it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Object metadata
    pub meta: ObjectMeta,

    /// Desired state, owned by the user
    pub spec: DeploymentSpec,

    /// Observed state, owned by the controller
    #[serde(default)]
    pub status: DeploymentStatus,
}

impl Deployment {
    pub fn new(meta: ObjectMeta, spec: DeploymentSpec) -> Self {
        Self {
            meta,
            spec,
            status: DeploymentStatus::default(),
        }
    }
}

/// Desired state of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Source of the base manifest
    pub manifest: ResourceReference,

    /// Ops files, applied in order
    #[serde(default)]
    pub ops: Vec<ResourceReference>,

    /// Variable sources, later entries win on conflicting names
    #[serde(default)]
    pub vars: Vec<VariableReference>,
}

impl DeploymentSpec {
    pub fn new(manifest: ResourceReference) -> Self {
        Self {
            manifest,
            ops: Vec::new(),
            vars: Vec::new(),
        }
    }

    pub fn with_ops(mut self, reference: ResourceReference) -> Self {
        self.ops.push(reference);
        self
    }

    pub fn with_var(mut self, reference: VariableReference) -> Self {
        self.vars.push(reference);
        self
    }

    /// Whether this spec reads the given object as one of its inputs.
    pub fn references(&self, kind: ObjectKind, name: &str) -> bool {
        let by_resource = std::iter::once(&self.manifest)
            .chain(self.ops.iter())
            .any(|r| r.kind.object_kind() == kind && r.name == name);
        let by_variable =
            kind == ObjectKind::Secret && self.vars.iter().any(|v| v.secret == name);
        by_resource || by_variable
    }
}

/// Kinds of object a manifest or ops file can be read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    ConfigMap,
    Secret,
}

impl ReferenceKind {
    pub fn object_kind(self) -> ObjectKind {
        match self {
            ReferenceKind::ConfigMap => ObjectKind::ConfigMap,
            ReferenceKind::Secret => ObjectKind::Secret,
        }
    }
}

/// Reference to a document stored under a well-known key of a ConfigMap or Secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
    /// Kind of the referenced object
    #[serde(rename = "type")]
    pub kind: ReferenceKind,

    /// Name of the referenced object in the deployment's namespace
    pub name: String,
}

impl ResourceReference {
    /// Data key the referenced document is read from
    pub const DATA_KEY: &'static str = "ops";

    /// Data key a manifest is read from
    pub const MANIFEST_KEY: &'static str = "manifest";

    pub fn config_map(name: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::ConfigMap,
            name: name.into(),
        }
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::Secret,
            name: name.into(),
        }
    }
}

/// Binds a manifest variable to the data of a secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableReference {
    /// Variable name as used in `((name))` placeholders
    pub name: String,

    /// Secret whose data provides the value
    pub secret: String,
}

impl VariableReference {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

/// Rendering phase of a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPhase {
    /// Not rendered yet
    #[default]
    Pending,
    /// A reconcile is rendering the manifest
    Rendering,
    /// The last render succeeded and was published
    Ready,
    /// The last render failed; `message` says why
    Failed,
}

/// Observed state of a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    /// Current phase
    pub phase: DeploymentPhase,

    /// Human readable reason for the phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Number of renders published so far; 0 means no rollout has happened
    #[serde(default)]
    pub rendered_version: u64,

    /// Last reconcile timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile: Option<chrono::DateTime<chrono::Utc>>,
}

impl DeploymentStatus {
    pub fn is_ready(&self) -> bool {
        self.phase == DeploymentPhase::Ready
    }

    /// The first rollout has not been published yet.
    pub fn is_initial_rollout(&self) -> bool {
        self.rendered_version == 0
    }
}
