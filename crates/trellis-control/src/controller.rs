//! Deployment controller
//!
//! Glue between the watch stream and the scheduler: every watch event is
//! filtered, resolved to the deployments it affects and turned into
//! reconcile requests.

use crate::events::EventBus;
use crate::filter::{Clock, Decision, EventFilter, Watch, WatchEvent};
use crate::reconciler::DeploymentReconciler;
use crate::reference::ReferenceTracker;
use crate::scheduler::{BackoffConfig, ReconcileScheduler, SchedulerStats};
use crate::sink::RenderSink;
use crate::store::ClusterStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, trace, warn};
use trellis_types::ControllerEvent;

/// Name the controller publishes its events under
pub const CONTROLLER_NAME: &str = "deployment";

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Worker pool size
    pub max_concurrent_reconciles: usize,

    /// Cool-down window after a reconcile (seconds)
    pub meltdown_secs: u64,

    /// Namespaces to act on; empty means all
    pub monitored_namespaces: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: 1,
            meltdown_secs: 60,
            monitored_namespaces: Vec::new(),
        }
    }
}

impl ControllerConfig {
    pub fn meltdown_window(&self) -> Duration {
        Duration::from_secs(self.meltdown_secs)
    }

    pub fn monitors(&self, namespace: &str) -> bool {
        self.monitored_namespaces.is_empty()
            || self.monitored_namespaces.iter().any(|n| n == namespace)
    }
}

/// Watches deployments and their inputs and keeps renders current
pub struct DeploymentController {
    config: ControllerConfig,
    filters: Vec<EventFilter>,
    tracker: ReferenceTracker,
    scheduler: ReconcileScheduler,
    reconciler: Arc<DeploymentReconciler>,
    events: EventBus,
}

impl std::fmt::Debug for DeploymentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentController")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl DeploymentController {
    pub fn new(
        config: ControllerConfig,
        backoff: BackoffConfig,
        store: Arc<dyn ClusterStore>,
        sink: Arc<dyn RenderSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = EventBus::new(CONTROLLER_NAME);
        let window = config.meltdown_window();
        let filters = [
            Watch::Deployments,
            Watch::Inputs,
            Watch::ProcessInfo,
            Watch::LinkProviders,
        ]
        .into_iter()
        .map(|watch| EventFilter::new(watch, window, Arc::clone(&clock)))
        .collect();

        Self {
            tracker: ReferenceTracker::new(Arc::clone(&store)),
            scheduler: ReconcileScheduler::new(backoff, events.clone()),
            reconciler: Arc::new(DeploymentReconciler::new(store, sink, events.clone(), clock)),
            filters,
            events,
            config,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scheduler(&self) -> &ReconcileScheduler {
        &self.scheduler
    }

    /// Start the reconcile workers.
    pub async fn start(&self) {
        self.scheduler
            .start(self.reconciler.clone(), self.config.max_concurrent_reconciles)
            .await;
        info!(
            workers = self.config.max_concurrent_reconciles,
            meltdown_secs = self.config.meltdown_secs,
            namespaces = ?self.config.monitored_namespaces,
            "Deployment controller started"
        );
    }

    /// Turn one watch event into reconcile requests.
    ///
    /// Returns the number of deployments requested, immediately or after a
    /// cool-down.
    pub async fn handle(&self, event: &WatchEvent) -> usize {
        let object = event.object();
        let meta = object.meta();
        if !self.config.monitors(&meta.namespace) {
            trace!(object = %meta.key(), "Namespace not monitored");
            return 0;
        }

        let decision = Watch::for_kind(object.kind())
            .iter()
            .filter_map(|watch| self.filter(*watch))
            .map(|filter| filter.decide(event))
            .fold(Decision::Ignore, strongest);

        let delay = match decision {
            Decision::Ignore => return 0,
            Decision::Process => None,
            Decision::CoolingDown { remaining } => Some(remaining),
        };

        let keys = self.tracker.reconciles_for(object).await;
        let trigger = format!("{} {} {}", event.name(), object.kind(), meta.key());
        for key in &keys {
            match delay {
                None => {
                    self.events.emit(ControllerEvent::ReconcileRequested {
                        key: key.clone(),
                        trigger: trigger.clone(),
                    });
                    self.scheduler.enqueue(key.clone()).await;
                }
                Some(remaining) => {
                    debug!(
                        deployment = %key,
                        trigger = %trigger,
                        remaining_ms = remaining.as_millis() as u64,
                        "Trigger cooling down"
                    );
                    self.scheduler.enqueue_after(key.clone(), remaining).await;
                }
            }
        }
        keys.len()
    }

    /// Consume a watch stream until it closes.
    pub async fn run(&self, mut watch: broadcast::Receiver<WatchEvent>) {
        loop {
            match watch.recv().await {
                Ok(event) => {
                    self.handle(&event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Watch stream lagged, events were dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Watch stream closed");
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.scheduler.stats().await
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("Deployment controller stopped");
    }

    fn filter(&self, watch: Watch) -> Option<&EventFilter> {
        self.filters.iter().find(|f| f.watch() == watch)
    }
}

/// Process beats a cool-down, a cool-down beats ignoring; the shorter cool-down wins.
fn strongest(a: Decision, b: Decision) -> Decision {
    match (a, b) {
        (Decision::Process, _) | (_, Decision::Process) => Decision::Process,
        (Decision::CoolingDown { remaining: x }, Decision::CoolingDown { remaining: y }) => {
            Decision::CoolingDown {
                remaining: x.min(y),
            }
        }
        (cooling @ Decision::CoolingDown { .. }, _) | (_, cooling @ Decision::CoolingDown { .. }) => {
            cooling
        }
        _ => Decision::Ignore,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strongest_decision() {
        let short = Decision::CoolingDown {
            remaining: Duration::from_secs(1),
        };
        let long = Decision::CoolingDown {
            remaining: Duration::from_secs(9),
        };
        assert_eq!(strongest(Decision::Ignore, Decision::Process), Decision::Process);
        assert_eq!(strongest(long, Decision::Process), Decision::Process);
        assert_eq!(strongest(long, short), short);
        assert_eq!(strongest(Decision::Ignore, long), long);
        assert_eq!(strongest(Decision::Ignore, Decision::Ignore), Decision::Ignore);
    }

    #[test]
    fn test_namespace_monitoring() {
        let all = ControllerConfig::default();
        assert!(all.monitors("anything"));

        let some = ControllerConfig {
            monitored_namespaces: vec!["fleet".into()],
            ..Default::default()
        };
        assert!(some.monitors("fleet"));
        assert!(!some.monitors("kube-system"));
    }
}
