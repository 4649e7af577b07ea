//! Watched cluster objects
//!
//! The controller watches a small closed set of kinds. [`ClusterObject`] is
//! the tagged union over them; the payload types are plain data.

use crate::deployment::Deployment;
use crate::labels::{
    LABEL_LINK_PROVIDER_NAME, LABEL_SECRET_KIND, LABEL_SECRET_TYPE, SECRET_KIND_VERSIONED,
};
use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind tag of a watched object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Deployment,
    ConfigMap,
    Secret,
    Service,
    Endpoints,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Deployment => "Deployment",
            ObjectKind::ConfigMap => "ConfigMap",
            ObjectKind::Secret => "Secret",
            ObjectKind::Service => "Service",
            ObjectKind::Endpoints => "Endpoints",
        };
        f.write_str(name)
    }
}

/// Plain configuration data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(meta: ObjectMeta) -> Self {
        Self {
            meta,
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Sensitive configuration data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(meta: ObjectMeta) -> Self {
        Self {
            meta,
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Written by the versioned secret store.
    pub fn is_versioned(&self) -> bool {
        self.meta.label(LABEL_SECRET_KIND) == Some(SECRET_KIND_VERSIONED)
    }

    /// Value of the secret-type label, if any.
    pub fn secret_type(&self) -> Option<&str> {
        self.meta.label(LABEL_SECRET_TYPE)
    }
}

/// Network service in front of a set of pods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

impl Service {
    pub fn new(meta: ObjectMeta) -> Self {
        Self {
            meta,
            selector: BTreeMap::new(),
        }
    }

    /// Fronts a link provider consumed by a deployment.
    pub fn is_link_provider(&self) -> bool {
        self.meta.labels.contains_key(LABEL_LINK_PROVIDER_NAME)
    }
}

/// One resolved endpoint address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// Addresses backing the service of the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
}

impl Endpoints {
    pub fn new(meta: ObjectMeta) -> Self {
        Self {
            meta,
            addresses: Vec::new(),
        }
    }
}

/// Tagged union over every watched kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClusterObject {
    Deployment(Deployment),
    ConfigMap(ConfigMap),
    Secret(Secret),
    Service(Service),
    Endpoints(Endpoints),
}

impl ClusterObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ClusterObject::Deployment(_) => ObjectKind::Deployment,
            ClusterObject::ConfigMap(_) => ObjectKind::ConfigMap,
            ClusterObject::Secret(_) => ObjectKind::Secret,
            ClusterObject::Service(_) => ObjectKind::Service,
            ClusterObject::Endpoints(_) => ObjectKind::Endpoints,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ClusterObject::Deployment(o) => &o.meta,
            ClusterObject::ConfigMap(o) => &o.meta,
            ClusterObject::Secret(o) => &o.meta,
            ClusterObject::Service(o) => &o.meta,
            ClusterObject::Endpoints(o) => &o.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ClusterObject::Deployment(o) => &mut o.meta,
            ClusterObject::ConfigMap(o) => &mut o.meta,
            ClusterObject::Secret(o) => &mut o.meta,
            ClusterObject::Service(o) => &mut o.meta,
            ClusterObject::Endpoints(o) => &mut o.meta,
        }
    }
}

impl From<Deployment> for ClusterObject {
    fn from(o: Deployment) -> Self {
        ClusterObject::Deployment(o)
    }
}

impl From<ConfigMap> for ClusterObject {
    fn from(o: ConfigMap) -> Self {
        ClusterObject::ConfigMap(o)
    }
}

impl From<Secret> for ClusterObject {
    fn from(o: Secret) -> Self {
        ClusterObject::Secret(o)
    }
}

impl From<Service> for ClusterObject {
    fn from(o: Service) -> Self {
        ClusterObject::Service(o)
    }
}

impl From<Endpoints> for ClusterObject {
    fn from(o: Endpoints) -> Self {
        ClusterObject::Endpoints(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{LABEL_DEPLOYMENT_NAME, SECRET_TYPE_BPM};

    #[test]
    fn test_versioned_secret_markers() {
        let plain = Secret::new(ObjectMeta::new("fleet", "creds"));
        assert!(!plain.is_versioned());
        assert_eq!(plain.secret_type(), None);

        let bpm = Secret::new(
            ObjectMeta::new("fleet", "cf.bpm.api-v1")
                .with_label(LABEL_SECRET_KIND, SECRET_KIND_VERSIONED)
                .with_label(LABEL_SECRET_TYPE, SECRET_TYPE_BPM),
        );
        assert!(bpm.is_versioned());
        assert_eq!(bpm.secret_type(), Some(SECRET_TYPE_BPM));
    }

    #[test]
    fn test_link_provider_service() {
        let svc = Service::new(
            ObjectMeta::new("fleet", "nats")
                .with_label(LABEL_DEPLOYMENT_NAME, "cf")
                .with_label(LABEL_LINK_PROVIDER_NAME, "nats"),
        );
        assert!(svc.is_link_provider());
        assert!(!Service::new(ObjectMeta::new("fleet", "web")).is_link_provider());
    }

    #[test]
    fn test_cluster_object_tagged_yaml() {
        let yaml = r#"
- kind: ConfigMap
  meta: { name: base, namespace: fleet }
  data:
    manifest: "name: cf"
- kind: Service
  meta:
    name: nats
    namespace: fleet
    labels: { trellis.dev/link-provider-name: nats }
"#;
        let objects: Vec<ClusterObject> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(objects[0].kind(), ObjectKind::ConfigMap);
        assert_eq!(objects[1].kind(), ObjectKind::Service);
        assert_eq!(objects[1].meta().key().to_string(), "fleet/nats");
    }
}
