//! Controller lifecycle management
//!
//! Runs the deployment controller against the in-memory store until a
//! shutdown signal arrives, then reports what was rendered.

use crate::config::DaemonConfig;
use crate::error::{read_yaml, DaemonResult};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use trellis_control::{
    DeploymentController, InMemoryClusterStore, MemoryRenderSink, SchedulerStats, SystemClock,
};
use trellis_types::{ClusterObject, ControllerEventEnvelope, DeploymentPhase, ObjectKey};

/// Load a YAML list of cluster objects.
pub fn load_objects(path: &Path) -> DaemonResult<Vec<ClusterObject>> {
    read_yaml(path)
}

/// Outcome of one deployment at shutdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub deployment: ObjectKey,
    pub phase: DeploymentPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub rendered_version: u64,
    pub instances: usize,
}

/// Report printed when the daemon stops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub deployments: Vec<DeploymentSummary>,
    pub stats: SchedulerStats,
}

/// Trellis daemon
pub struct Daemon {
    store: Arc<InMemoryClusterStore>,
    sink: Arc<MemoryRenderSink>,
    controller: Arc<DeploymentController>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: DaemonConfig) -> Self {
        let store = Arc::new(InMemoryClusterStore::new());
        let sink = Arc::new(MemoryRenderSink::new());
        let controller = Arc::new(DeploymentController::new(
            config.controller,
            config.backoff,
            store.clone(),
            sink.clone(),
            Arc::new(SystemClock),
        ));
        Self {
            store,
            sink,
            controller,
        }
    }

    pub fn store(&self) -> &Arc<InMemoryClusterStore> {
        &self.store
    }

    pub fn sink(&self) -> &Arc<MemoryRenderSink> {
        &self.sink
    }

    pub fn controller(&self) -> &Arc<DeploymentController> {
        &self.controller
    }

    /// Run until `shutdown` resolves.
    ///
    /// `seed` objects are applied after the controller is watching, so each
    /// one is seen as a creation. With `on_event`, every controller event is
    /// passed to it as it happens.
    pub async fn run<F>(
        self,
        seed: Vec<ClusterObject>,
        on_event: Option<fn(&ControllerEventEnvelope)>,
        shutdown: F,
    ) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        self.controller.start().await;

        let printer = on_event.map(|callback| {
            let mut events = self.controller.events().subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(envelope) => callback(&envelope),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event printer lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        });

        let runner = {
            let controller = Arc::clone(&self.controller);
            let watch = self.store.watch();
            tokio::spawn(async move { controller.run(watch).await })
        };

        let seeded = seed.len();
        for object in seed {
            self.store.apply(object).await;
        }
        info!(objects = seeded, "Store seeded");

        shutdown.await;
        info!("Trellis daemon shutting down");

        runner.abort();
        self.controller.shutdown().await;
        if let Some(printer) = printer {
            printer.abort();
        }

        self.summary().await
    }

    async fn summary(&self) -> RunSummary {
        let mut deployments = Vec::new();
        for object in self.store.objects().await {
            let ClusterObject::Deployment(deployment) = object else {
                continue;
            };
            let key = deployment.meta.key();
            let instances = self
                .sink
                .latest(&key)
                .await
                .map(|r| r.instance_groups.iter().map(|g| g.instance_count()).sum())
                .unwrap_or(0);
            deployments.push(DeploymentSummary {
                deployment: key,
                phase: deployment.status.phase,
                message: deployment.status.message,
                rendered_version: deployment.status.rendered_version,
                instances,
            });
        }
        RunSummary {
            deployments,
            stats: self.controller.stats().await,
        }
    }
}

/// Graceful shutdown signal handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
