//! Deployment manifest model
//!
//! Typed view over a rendered manifest. Only the parts the controller acts
//! on are modelled; everything else is carried through as raw YAML.

use crate::error::{RenderError, RenderResult};
use crate::patch::PreRenderOps;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use trellis_types::labels::{
    LABEL_DEPLOYMENT_NAME, LABEL_DEPLOYMENT_VERSION, LABEL_INSTANCE_GROUP_NAME,
};

/// A deployment manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    #[serde(default)]
    pub instance_groups: InstanceGroups,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub releases: Vec<Release>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stemcells: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Manifest {
    pub fn from_yaml(bytes: &[u8]) -> RenderResult<Self> {
        serde_yaml::from_slice(bytes).map_err(|e| RenderError::parse("manifest", e))
    }

    pub fn to_yaml(&self) -> RenderResult<Vec<u8>> {
        serde_yaml::to_string(self)
            .map(String::into_bytes)
            .map_err(|e| RenderError::Serialize(e.to_string()))
    }
}

/// A release referenced by the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

/// A generated variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Instance groups in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceGroups(pub Vec<InstanceGroup>);

impl InstanceGroups {
    pub fn by_name(&self, name: &str) -> Option<&InstanceGroup> {
        self.0.iter().find(|group| group.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstanceGroup> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a InstanceGroups {
    type Item = &'a InstanceGroup;
    type IntoIter = std::slice::Iter<'a, InstanceGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How the workloads of an instance group run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    /// Long-running
    #[default]
    Service,
    /// Run on demand
    Errand,
    /// Run once whenever the deployment changes
    AutoErrand,
}

impl Lifecycle {
    pub fn is_errand(self) -> bool {
        matches!(self, Lifecycle::Errand | Lifecycle::AutoErrand)
    }
}

/// One instance group declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,

    #[serde(default)]
    pub instances: u32,

    #[serde(default)]
    pub azs: Vec<String>,

    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vm_extensions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_resources: Option<VmResources>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stemcell: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_disk: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_disk_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrated_from: Vec<MigratedFrom>,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    #[serde(default)]
    pub properties: InstanceGroupProperties,

    #[serde(default)]
    pub env: AgentEnv,
}

impl InstanceGroup {
    pub fn new(name: impl Into<String>, instances: u32) -> Self {
        Self {
            name: name.into(),
            instances,
            azs: Vec::new(),
            jobs: Vec::new(),
            vm_type: None,
            vm_extensions: Vec::new(),
            vm_resources: None,
            stemcell: None,
            persistent_disk: None,
            persistent_disk_type: None,
            networks: Vec::new(),
            update: None,
            migrated_from: Vec::new(),
            lifecycle: Lifecycle::default(),
            properties: InstanceGroupProperties::default(),
            env: AgentEnv::default(),
        }
    }

    pub fn with_azs<I, S>(mut self, azs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.azs = azs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    /// Pre-render ops declared in the agent settings, if any.
    pub fn pre_render_ops(&self) -> Option<&PreRenderOps> {
        self.env.bosh.agent.settings.pre_render_ops.as_ref()
    }
}

/// Instance group properties; `quarks` is split out, the rest is kept raw
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroupProperties {
    #[serde(default, skip_serializing_if = "InstanceGroupQuarks::is_empty")]
    pub quarks: InstanceGroupQuarks,

    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroupQuarks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_service: Option<String>,
}

impl InstanceGroupQuarks {
    pub fn is_empty(&self) -> bool {
        self.required_service.is_none()
    }
}

/// A job colocated in an instance group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,

    #[serde(default)]
    pub release: String,

    #[serde(default)]
    pub properties: JobProperties,
}

impl Job {
    pub fn new(name: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            release: release.into(),
            properties: JobProperties::default(),
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.properties.quarks.ports.push(port);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProperties {
    #[serde(default, skip_serializing_if = "JobQuarks::is_empty")]
    pub quarks: JobQuarks,

    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

/// Operator-specific job settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobQuarks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,

    /// Process configuration overriding the release's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<Value>,
}

impl JobQuarks {
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty() && self.bpm.is_none()
    }
}

/// A port a job exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub internal: u16,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

impl Port {
    pub fn tcp(name: impl Into<String>, internal: u16) -> Self {
        Self {
            name: name.into(),
            protocol: default_protocol(),
            internal,
        }
    }
}

/// Port exposed on the services fronting an instance group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: String,
    pub protocol: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmResources {
    #[serde(default)]
    pub cpu: u32,
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub ephemeral_disk_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<String>,
}

/// Rollout settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canaries: Option<u32>,
    /// Count or percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary_watch_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_watch_time: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_strategy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratedFrom {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEnv {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_disk_fs: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent_disk_mount_options: Vec<String>,

    #[serde(default)]
    pub bosh: AgentEnvBoshConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEnvBoshConfig {
    #[serde(default)]
    pub agent: Agent,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(default)]
    pub settings: AgentSettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmpfs: Option<bool>,
}

/// Agent settings; labels and annotations end up on generated objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(
        rename = "serviceAccountName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_log_sidecar: bool,

    #[serde(
        rename = "preRenderOps",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pre_render_ops: Option<PreRenderOps>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl AgentSettings {
    /// Overwrite the operator-owned labels.
    pub fn set_operator_labels(&mut self, deployment: &str, instance_group: &str, version: &str) {
        self.labels
            .insert(LABEL_DEPLOYMENT_NAME.to_string(), deployment.to_string());
        self.labels.insert(
            LABEL_INSTANCE_GROUP_NAME.to_string(),
            instance_group.to_string(),
        );
        self.labels
            .insert(LABEL_DEPLOYMENT_VERSION.to_string(), version.to_string());
    }
}
