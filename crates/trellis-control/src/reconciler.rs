//! Deployment reconciler
//!
//! One reconcile loads the deployment and its inputs, renders the manifest,
//! expands every instance group, publishes the result and records the
//! outcome on the deployment status.

use crate::error::{ReconcileError, ReconcileResult, StoreError};
use crate::events::EventBus;
use crate::filter::Clock;
use crate::scheduler::{Outcome, Reconciler};
use crate::sink::{RenderSink, RenderedDeployment, RenderedInstanceGroup};
use crate::store::ClusterStore;
use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trellis_manifest::{Manifest, OpsBuilder};
use trellis_types::{
    ControllerEvent, Deployment, DeploymentPhase, DeploymentStatus, ObjectKey, ReferenceKind,
    ResourceReference, VariableReference,
};

/// Secret data key holding a plain variable value
pub const VARIABLE_VALUE_KEY: &str = "value";

/// Renders deployments and publishes the result
pub struct DeploymentReconciler {
    store: Arc<dyn ClusterStore>,
    sink: Arc<dyn RenderSink>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DeploymentReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentReconciler").finish_non_exhaustive()
    }
}

impl DeploymentReconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        sink: Arc<dyn RenderSink>,
        events: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sink,
            events,
            clock,
        }
    }

    /// Render `deployment` without side effects.
    pub async fn render(&self, deployment: &Deployment) -> ReconcileResult<RenderedDeployment> {
        let namespace = &deployment.meta.namespace;
        let spec = &deployment.spec;

        let manifest = self
            .read_document(namespace, &spec.manifest, ResourceReference::MANIFEST_KEY)
            .await?;

        let mut builder = OpsBuilder::new();
        for ops in &spec.ops {
            let document = self
                .read_document(namespace, ops, ResourceReference::DATA_KEY)
                .await?;
            builder.build_ops(document.as_bytes())?;
        }
        let vars = self.load_variables(namespace, &spec.vars).await?;

        let ops = builder.finish();
        let interpolated = ops.interpolate(manifest.as_bytes(), &vars)?;
        let manifest = Manifest::from_yaml(&interpolated)?;

        let version = deployment.status.rendered_version + 1;
        let initial_rollout = deployment.status.is_initial_rollout();
        let mut instance_groups = Vec::with_capacity(manifest.instance_groups.len());
        for group in &manifest.instance_groups {
            let mut group = group.apply_pre_render_ops(&vars)?;
            let name = group.name.clone();
            group.env.bosh.agent.settings.set_operator_labels(
                &deployment.meta.name,
                &name,
                &version.to_string(),
            );
            instance_groups.push(RenderedInstanceGroup::from_group(&group, initial_rollout));
        }

        Ok(RenderedDeployment {
            deployment: deployment.meta.key(),
            version,
            manifest: interpolated,
            instance_groups,
        })
    }

    /// Data entry `data_key` of the referenced ConfigMap or Secret.
    async fn read_document(
        &self,
        namespace: &str,
        reference: &ResourceReference,
        data_key: &str,
    ) -> ReconcileResult<String> {
        let key = ObjectKey::new(namespace, &reference.name);
        let data = match reference.kind {
            ReferenceKind::ConfigMap => self.store.get_config_map(&key).await?.map(|c| c.data),
            ReferenceKind::Secret => self.store.get_secret(&key).await?.map(|s| s.data),
        };
        let kind = reference.kind.object_kind();
        let mut data =
            data.ok_or_else(|| ReconcileError::Fatal(format!("{kind} {key} not found")))?;
        data.remove(data_key).ok_or_else(|| {
            ReconcileError::Fatal(format!("{kind} {key} has no '{data_key}' entry"))
        })
    }

    /// Variables from secrets; later references win.
    ///
    /// A secret with a `value` entry provides that string, any other secret
    /// provides a mapping of all its entries.
    async fn load_variables(
        &self,
        namespace: &str,
        references: &[VariableReference],
    ) -> ReconcileResult<BTreeMap<String, Value>> {
        let mut vars = BTreeMap::new();
        for reference in references {
            let key = ObjectKey::new(namespace, &reference.secret);
            let secret = self.store.get_secret(&key).await?.ok_or_else(|| {
                ReconcileError::Fatal(format!(
                    "secret {key} for variable '{}' not found",
                    reference.name
                ))
            })?;
            let value = match secret.data.get(VARIABLE_VALUE_KEY) {
                Some(value) => Value::String(value.clone()),
                None => Value::Mapping(
                    secret
                        .data
                        .iter()
                        .map(|(k, v)| (Value::String(k.clone()), Value::String(v.clone())))
                        .collect::<Mapping>(),
                ),
            };
            vars.insert(reference.name.clone(), value);
        }
        Ok(vars)
    }

    /// Write a status. `Ok(None)` means the deployment is gone.
    async fn write_status(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        status: DeploymentStatus,
    ) -> ReconcileResult<Option<Deployment>> {
        match self
            .store
            .update_deployment_status(key, resource_version, status)
            .await
        {
            Ok(updated) => Ok(Some(updated)),
            Err(StoreError::NotFound { .. }) => {
                info!(deployment = %key, "Deployment deleted during reconcile");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mark the deployment failed. A failed write is transient so the
    /// failure gets recorded on a later attempt.
    async fn record_failure(
        &self,
        key: &ObjectKey,
        resource_version: u64,
        previous: &DeploymentStatus,
        reason: &str,
    ) -> ReconcileResult<()> {
        let status = DeploymentStatus {
            phase: DeploymentPhase::Failed,
            message: Some(reason.to_string()),
            ..previous.clone()
        };
        self.write_status(key, resource_version, status)
            .await
            .map(|_| ())
            .inspect_err(|e| {
                warn!(deployment = %key, error = %e, "Failed to record render failure");
            })
    }
}

#[async_trait]
impl Reconciler for DeploymentReconciler {
    async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, ReconcileError> {
        let Some(deployment) = self.store.get_deployment(key).await? else {
            debug!(deployment = %key, "Deployment not found, nothing to do");
            return Ok(Outcome::Done);
        };

        let mut resource_version = deployment.meta.resource_version;
        if deployment.status.phase != DeploymentPhase::Rendering {
            let status = DeploymentStatus {
                phase: DeploymentPhase::Rendering,
                message: None,
                ..deployment.status.clone()
            };
            match self.write_status(key, resource_version, status).await? {
                Some(updated) => resource_version = updated.meta.resource_version,
                None => return Ok(Outcome::Done),
            }
        }

        let rendered = match self.render(&deployment).await {
            Ok(rendered) => rendered,
            Err(ReconcileError::Fatal(reason)) => {
                warn!(deployment = %key, error = %reason, "Render failed");
                self.record_failure(key, resource_version, &deployment.status, &reason)
                    .await?;
                return Err(ReconcileError::Fatal(reason));
            }
            Err(e) => return Err(e),
        };

        let version = rendered.version;
        let instances: usize = rendered
            .instance_groups
            .iter()
            .map(RenderedInstanceGroup::instance_count)
            .sum();
        self.sink.publish(rendered).await?;

        let status = DeploymentStatus {
            phase: DeploymentPhase::Ready,
            message: None,
            rendered_version: version,
            last_reconcile: Some(self.clock.now()),
        };
        if self.write_status(key, resource_version, status).await?.is_none() {
            return Ok(Outcome::Done);
        }

        info!(deployment = %key, version, instances, "Deployment rendered");
        self.events.emit(ControllerEvent::ReconcileSucceeded {
            key: key.clone(),
            rendered_version: version,
        });
        Ok(Outcome::Done)
    }

    async fn abandoned(&self, key: &ObjectKey, reason: &str) {
        let deployment = match self.store.get_deployment(key).await {
            Ok(Some(deployment)) => deployment,
            Ok(None) => return,
            Err(e) => {
                warn!(deployment = %key, error = %e, "Cannot record abandoned reconcile");
                return;
            }
        };
        let reason = format!("giving up after repeated failures: {reason}");
        // Already logged inside
        let _ = self
            .record_failure(
                key,
                deployment.meta.resource_version,
                &deployment.status,
                &reason,
            )
            .await;
    }
}
