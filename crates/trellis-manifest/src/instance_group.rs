//! Instance group expansion
//!
//! Expands an instance group into the concrete instances of one of its jobs.
//! Instances are generated once per availability zone, in the order the zones
//! are declared; a group without zones gets a single pass with no zone. The
//! global index runs across all passes.
//!
//! Exactly one instance is the bootstrap instance: the first one during the
//! initial rollout, the last one afterwards. Picking the last instance on
//! updates means the bootstrap work runs after every other instance has been
//! updated.

use crate::error::{RenderError, RenderResult};
use crate::manifest::{InstanceGroup, ServicePort};
use crate::names::{sanitize, truncated_service_name, MAX_SERVICE_NAME_LENGTH};
use crate::variables::VariableSource;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// One concrete instance of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInstance {
    /// Service address of the instance
    pub address: String,

    /// Zone the instance runs in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az: Option<String>,

    /// Position across all zones
    pub index: usize,

    /// Position within the zone
    pub instance_number: usize,

    pub name: String,

    pub id: String,

    pub bootstrap: bool,
}

/// Expand `group` into the instances of `job_name`.
pub fn expand(group: &InstanceGroup, job_name: &str, initial_rollout: bool) -> Vec<JobInstance> {
    group.job_instances(job_name, initial_rollout)
}

impl InstanceGroup {
    pub fn name_sanitized(&self) -> String {
        sanitize(&self.name)
    }

    /// Number of generation passes: one per zone, at least one.
    pub fn az_count(&self) -> usize {
        self.azs.len().max(1)
    }

    /// Name of the service addressing one instance.
    ///
    /// `az_index` is `None` for groups declared without zones.
    pub fn indexed_service_name(&self, index: usize, az_index: Option<usize>) -> String {
        let service = truncated_service_name(&self.name, MAX_SERVICE_NAME_LENGTH);
        match az_index {
            Some(az) => format!("{service}-z{az}-{index}"),
            None => format!("{service}-{index}"),
        }
    }

    /// Global index of the bootstrap instance.
    pub fn bootstrap_index(&self, initial_rollout: bool) -> usize {
        if initial_rollout {
            0
        } else {
            (self.instances as usize * self.az_count()).saturating_sub(1)
        }
    }

    pub fn job_instances(&self, job_name: &str, initial_rollout: bool) -> Vec<JobInstance> {
        let instances = self.instances as usize;
        let mut out = Vec::with_capacity(instances * self.az_count());
        if instances == 0 {
            return out;
        }

        let bootstrap = self.bootstrap_index(initial_rollout);
        let sanitized = self.name_sanitized();
        let name = format!("{sanitized}-{job_name}");

        let passes: Vec<(Option<usize>, Option<&String>)> = if self.azs.is_empty() {
            vec![(None, None)]
        } else {
            self.azs
                .iter()
                .enumerate()
                .map(|(i, az)| (Some(i), Some(az)))
                .collect()
        };

        for (az_index, az) in passes {
            for instance_number in 0..instances {
                let index = out.len();
                let id = match az_index {
                    Some(z) => format!("{sanitized}-z{z}-{}", index % instances),
                    None => format!("{sanitized}-{index}"),
                };
                out.push(JobInstance {
                    address: self.indexed_service_name(instance_number, az_index),
                    az: az.cloned(),
                    index,
                    instance_number,
                    name: name.clone(),
                    id,
                    bootstrap: index == bootstrap,
                });
            }
        }
        out
    }

    /// Ports exposed by the jobs of this group, in job order.
    pub fn service_ports(&self) -> Vec<ServicePort> {
        self.jobs
            .iter()
            .flat_map(|job| job.properties.quarks.ports.iter())
            .map(|port| ServicePort {
                name: port.name.clone(),
                protocol: port.protocol.clone(),
                port: port.internal,
            })
            .collect()
    }

    /// Apply the group's own instance-group pre-render ops to itself.
    ///
    /// Groups without pre-render ops are returned unchanged.
    pub fn apply_pre_render_ops(&self, vars: &dyn VariableSource) -> RenderResult<InstanceGroup> {
        let Some(ops) = self.pre_render_ops().filter(|ops| !ops.instance_group.is_empty()) else {
            return Ok(self.clone());
        };
        let document =
            serde_yaml::to_value(self).map_err(|e| RenderError::Serialize(e.to_string()))?;
        let rendered: Value = ops.instance_group_ops().render(&document, vars)?;
        serde_yaml::from_value(rendered).map_err(|e| RenderError::parse("instance group", e))
    }
}
