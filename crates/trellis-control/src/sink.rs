//! Render output
//!
//! A successful reconcile hands a [`RenderedDeployment`] to a [`RenderSink`],
//! which turns it into workloads. The sink is the controller's only write
//! besides the deployment status.

use crate::error::SinkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use trellis_manifest::{InstanceGroup, JobInstance, Lifecycle, ServicePort};
use trellis_types::ObjectKey;

/// Instances of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedJob {
    pub name: String,
    pub instances: Vec<JobInstance>,
}

/// One instance group, ready to be turned into workloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedInstanceGroup {
    pub name: String,
    pub lifecycle: Lifecycle,

    /// Operator labels to put on every generated object
    pub labels: BTreeMap<String, String>,

    pub ports: Vec<ServicePort>,
    pub jobs: Vec<RenderedJob>,
}

impl RenderedInstanceGroup {
    /// Expand every job of `group`.
    pub fn from_group(group: &InstanceGroup, initial_rollout: bool) -> Self {
        Self {
            name: group.name.clone(),
            lifecycle: group.lifecycle,
            labels: group.env.bosh.agent.settings.labels.clone(),
            ports: group.service_ports(),
            jobs: group
                .jobs
                .iter()
                .map(|job| RenderedJob {
                    name: job.name.clone(),
                    instances: group.job_instances(&job.name, initial_rollout),
                })
                .collect(),
        }
    }

    /// Instances across all jobs
    pub fn instance_count(&self) -> usize {
        self.jobs.iter().map(|j| j.instances.len()).sum()
    }
}

/// The complete output of one render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDeployment {
    pub deployment: ObjectKey,

    /// Render generation, starting at 1
    pub version: u64,

    /// Interpolated manifest
    pub manifest: Vec<u8>,

    pub instance_groups: Vec<RenderedInstanceGroup>,
}

/// Consumer of rendered deployments
#[async_trait]
pub trait RenderSink: Send + Sync {
    async fn publish(&self, rendered: RenderedDeployment) -> Result<(), SinkError>;
}

/// Sink that keeps every publication in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRenderSink {
    published: Arc<RwLock<Vec<RenderedDeployment>>>,
    failures: Arc<RwLock<u32>>,
}

impl MemoryRenderSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` publications.
    pub async fn fail_next(&self, times: u32) {
        *self.failures.write().await = times;
    }

    /// All publications, oldest first
    pub async fn published(&self) -> Vec<RenderedDeployment> {
        self.published.read().await.clone()
    }

    /// Most recent publication for `key`
    pub async fn latest(&self, key: &ObjectKey) -> Option<RenderedDeployment> {
        self.published
            .read()
            .await
            .iter()
            .rev()
            .find(|r| &r.deployment == key)
            .cloned()
    }
}

#[async_trait]
impl RenderSink for MemoryRenderSink {
    async fn publish(&self, rendered: RenderedDeployment) -> Result<(), SinkError> {
        {
            let mut failures = self.failures.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(SinkError {
                    key: rendered.deployment,
                    reason: "injected failure".into(),
                });
            }
        }
        self.published.write().await.push(rendered);
        Ok(())
    }
}
