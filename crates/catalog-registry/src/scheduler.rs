//! Scheduled dependency auto-wiring.
//!
//! Runs [`Registry::auto_wire_dependencies`] on a fixed interval so lineage
//! derived from pipeline topology catches up with pipelines linked since
//! the last pass. A failed pass is logged and the loop carries on.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use catalog_graph::GraphStore;

use crate::lineage::AutoWireReport;
use crate::registry::Registry;

/// Periodic auto-wiring job over a shared registry.
pub struct AutoWireScheduler<S> {
    registry: Arc<Registry<S>>,
    period: Duration,
}

impl<S: GraphStore + 'static> AutoWireScheduler<S> {
    pub fn new(registry: Arc<Registry<S>>, period: Duration) -> Self {
        Self { registry, period }
    }

    /// Use the registry's configured `autowire_interval_secs`.
    pub fn from_config(registry: Arc<Registry<S>>) -> Self {
        let secs = registry.config().autowire_interval_secs.max(1);
        Self::new(registry, Duration::from_secs(secs))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run forever. The first pass starts immediately.
    pub async fn run(&self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = self.period.as_secs(), "Auto-wire scheduler started");

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One pass. Errors are logged, not returned.
    pub async fn run_once(&self) -> Option<AutoWireReport> {
        match self.registry.auto_wire_dependencies().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Scheduled auto-wire failed");
                None
            }
        }
    }

    /// Run on a background task until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
