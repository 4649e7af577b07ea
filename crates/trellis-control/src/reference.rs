//! Reference tracking
//!
//! Maps a changed object to the deployments that have to be re-rendered
//! because of it. Resolution is best effort: a candidate whose lookup fails
//! is logged and left out, so a change can be missed for one cycle and is
//! picked up again the next time the object changes.

use crate::store::ClusterStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_types::labels::LABEL_DEPLOYMENT_NAME;
use trellis_types::{ClusterObject, ObjectKey, ObjectKind, ObjectMeta, Service};

/// Resolves dependency objects to the deployments that use them
#[derive(Clone)]
pub struct ReferenceTracker {
    store: Arc<dyn ClusterStore>,
}

impl std::fmt::Debug for ReferenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceTracker").finish_non_exhaustive()
    }
}

impl ReferenceTracker {
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }

    /// Deployments to reconcile because `object` changed.
    pub async fn reconciles_for(&self, object: &ClusterObject) -> BTreeSet<ObjectKey> {
        let meta = object.meta();
        if !meta.is_scoped() {
            return BTreeSet::new();
        }

        let keys = match object {
            ClusterObject::Deployment(_) => BTreeSet::from([meta.key()]),
            ClusterObject::ConfigMap(_) | ClusterObject::Secret(_) => {
                self.referencing_deployments(object.kind(), meta).await
            }
            ClusterObject::Service(service) => Self::link_consumers(service),
            ClusterObject::Endpoints(_) => match self.store.get_service(&meta.key()).await {
                Ok(Some(service)) => Self::link_consumers(&service),
                Ok(None) => BTreeSet::new(),
                Err(e) => {
                    warn!(endpoints = %meta.key(), error = %e, "Failed to look up backing service");
                    BTreeSet::new()
                }
            },
        };

        debug!(
            kind = %object.kind(),
            object = %meta.key(),
            reconciles = keys.len(),
            "Resolved references"
        );
        keys
    }

    /// Declared deployments that exist, plus every deployment of the
    /// namespace whose spec reads the object.
    async fn referencing_deployments(&self, kind: ObjectKind, meta: &ObjectMeta) -> BTreeSet<ObjectKey> {
        let mut keys = BTreeSet::new();

        for name in meta.declared_deployments() {
            let key = ObjectKey::new(&meta.namespace, name);
            match self.store.get_deployment(&key).await {
                Ok(Some(_)) => {
                    keys.insert(key);
                }
                Ok(None) => {
                    debug!(deployment = %key, object = %meta.key(), "Declared deployment does not exist");
                }
                Err(e) => {
                    warn!(deployment = %key, object = %meta.key(), error = %e, "Failed to confirm declared deployment");
                }
            }
        }

        match self.store.list_deployments(&meta.namespace).await {
            Ok(deployments) => keys.extend(
                deployments
                    .iter()
                    .filter(|d| d.spec.references(kind, &meta.name))
                    .map(|d| d.meta.key()),
            ),
            Err(e) => {
                warn!(namespace = %meta.namespace, object = %meta.key(), error = %e, "Failed to list deployments");
            }
        }

        keys
    }

    fn link_consumers(service: &Service) -> BTreeSet<ObjectKey> {
        if !service.is_link_provider() {
            return BTreeSet::new();
        }
        service
            .meta
            .label(LABEL_DEPLOYMENT_NAME)
            .map(|name| BTreeSet::from([ObjectKey::new(&service.meta.namespace, name)]))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailurePoint, InMemoryClusterStore};
    use trellis_types::labels::{ANNOTATION_CONSUMED_BY, LABEL_LINK_PROVIDER_NAME};
    use trellis_types::{
        ConfigMap, Deployment, DeploymentSpec, Endpoints, ResourceReference, Secret,
        VariableReference,
    };

    fn deployment(name: &str, spec: DeploymentSpec) -> Deployment {
        Deployment::new(ObjectMeta::new("fleet", name), spec)
    }

    fn keys(names: &[&str]) -> BTreeSet<ObjectKey> {
        names.iter().map(|n| ObjectKey::new("fleet", *n)).collect()
    }

    async fn store_with(deployments: Vec<Deployment>) -> Arc<InMemoryClusterStore> {
        let store = Arc::new(InMemoryClusterStore::new());
        for d in deployments {
            store.apply(d).await;
        }
        store
    }

    #[tokio::test]
    async fn test_declared_deployments_are_confirmed() {
        let store = store_with(vec![
            deployment("d1", DeploymentSpec::new(ResourceReference::config_map("m1"))),
            deployment("d2", DeploymentSpec::new(ResourceReference::config_map("m2"))),
        ])
        .await;
        let tracker = ReferenceTracker::new(store);

        let shared = ConfigMap::new(
            ObjectMeta::new("fleet", "shared")
                .with_label(LABEL_DEPLOYMENT_NAME, "d1")
                .with_annotation(ANNOTATION_CONSUMED_BY, "d2, ghost"),
        );
        assert_eq!(tracker.reconciles_for(&shared.into()).await, keys(&["d1", "d2"]));

        let unlabeled = ConfigMap::new(ObjectMeta::new("fleet", "unrelated"));
        assert!(tracker.reconciles_for(&unlabeled.into()).await.is_empty());
    }

    #[tokio::test]
    async fn test_spec_references_are_found() {
        let store = store_with(vec![
            deployment(
                "d1",
                DeploymentSpec::new(ResourceReference::config_map("base"))
                    .with_var(VariableReference::new("password", "creds")),
            ),
            deployment(
                "d2",
                DeploymentSpec::new(ResourceReference::config_map("other"))
                    .with_ops(ResourceReference::secret("creds")),
            ),
            deployment("d3", DeploymentSpec::new(ResourceReference::config_map("creds"))),
        ])
        .await;
        let tracker = ReferenceTracker::new(store);

        let secret = Secret::new(ObjectMeta::new("fleet", "creds"));
        assert_eq!(tracker.reconciles_for(&secret.into()).await, keys(&["d1", "d2"]));
    }

    #[tokio::test]
    async fn test_failed_lookup_excludes_candidate() {
        let store = store_with(vec![
            deployment("d1", DeploymentSpec::new(ResourceReference::config_map("m"))),
            deployment("d2", DeploymentSpec::new(ResourceReference::config_map("m"))),
        ])
        .await;
        store
            .fail_next(FailurePoint::GetDeployment(ObjectKey::new("fleet", "d1")), 1)
            .await;
        let tracker = ReferenceTracker::new(store.clone());

        let labeled = ConfigMap::new(
            ObjectMeta::new("fleet", "unused").with_annotation(ANNOTATION_CONSUMED_BY, "d1,d2"),
        );
        assert_eq!(tracker.reconciles_for(&labeled.clone().into()).await, keys(&["d2"]));

        // Re-observed on the next change
        assert_eq!(tracker.reconciles_for(&labeled.into()).await, keys(&["d1", "d2"]));
    }

    #[tokio::test]
    async fn test_failed_listing_keeps_declared() {
        let store = store_with(vec![deployment(
            "d1",
            DeploymentSpec::new(ResourceReference::config_map("m")),
        )])
        .await;
        store
            .fail_next(FailurePoint::ListDeployments("fleet".into()), 1)
            .await;
        let tracker = ReferenceTracker::new(store);

        let manifest = ConfigMap::new(ObjectMeta::new("fleet", "m").with_label(LABEL_DEPLOYMENT_NAME, "d1"));
        assert_eq!(tracker.reconciles_for(&manifest.into()).await, keys(&["d1"]));
    }

    #[tokio::test]
    async fn test_unscoped_objects_are_ignored() {
        let tracker = ReferenceTracker::new(Arc::new(InMemoryClusterStore::new()));
        let unnamed = ConfigMap::new(ObjectMeta::new("fleet", "").with_label(LABEL_DEPLOYMENT_NAME, "d1"));
        assert!(tracker.reconciles_for(&unnamed.into()).await.is_empty());
    }

    #[tokio::test]
    async fn test_deployment_maps_to_itself() {
        let tracker = ReferenceTracker::new(Arc::new(InMemoryClusterStore::new()));
        let d = deployment("d1", DeploymentSpec::new(ResourceReference::config_map("m")));
        assert_eq!(tracker.reconciles_for(&d.into()).await, keys(&["d1"]));
    }

    #[tokio::test]
    async fn test_link_provider_service_and_endpoints() {
        let store = Arc::new(InMemoryClusterStore::new());
        let provider = Service::new(
            ObjectMeta::new("fleet", "nats")
                .with_label(LABEL_LINK_PROVIDER_NAME, "nats")
                .with_label(LABEL_DEPLOYMENT_NAME, "d1"),
        );
        store.apply(provider.clone()).await;
        let tracker = ReferenceTracker::new(store);

        assert_eq!(tracker.reconciles_for(&provider.into()).await, keys(&["d1"]));

        let endpoints = Endpoints::new(ObjectMeta::new("fleet", "nats"));
        assert_eq!(tracker.reconciles_for(&endpoints.into()).await, keys(&["d1"]));

        let plain = Service::new(ObjectMeta::new("fleet", "web").with_label(LABEL_DEPLOYMENT_NAME, "d1"));
        assert!(tracker.reconciles_for(&plain.into()).await.is_empty());

        let orphan = Endpoints::new(ObjectMeta::new("fleet", "missing"));
        assert!(tracker.reconciles_for(&orphan.into()).await.is_empty());
    }
}
