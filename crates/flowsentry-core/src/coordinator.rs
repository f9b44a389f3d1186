//! Coordinator peer: ingests alerts, maintains the authoritative blocklist,
//! broadcasts updates and aggregates worker metrics.
//!
//! The event loop services the alert and completion channels concurrently,
//! preferring alerts so the blocklist converges while workers are still
//! streaming. Broadcasting over the watch channel never blocks, which is
//! what rules out the classic deadlock between a coordinator pushing a large
//! blocklist and a worker blocked on an alert send.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::blocklist::Blocklist;
use crate::protocol::{AlertEnvelope, BlocklistUpdate, WorkerReport};
use crate::types::{Alert, BlockedIp, ClusterConfig, Metrics};

/// Everything the coordinator accumulated by the time all workers reported.
pub(crate) struct CoordinatorOutcome {
    pub alerts: Vec<Alert>,
    pub blocklist: Vec<BlockedIp>,
    pub metrics: Metrics,
}

struct Coordinator {
    alerts: Vec<Alert>,
    blocklist: Blocklist,
    metrics: Metrics,
    max_global_alerts: usize,
    max_blocked_ips: usize,
    blocklist_tx: watch::Sender<BlocklistUpdate>,
    workers_done: usize,
}

impl Coordinator {
    /// Log the alert and extend the blocklist; on a fresh IP, broadcast the
    /// new full list to every worker.
    fn handle_alert(&mut self, envelope: AlertEnvelope) {
        let AlertEnvelope { worker, alert } = envelope;
        debug!(
            "alert from worker {}: {} ({}, confidence {:.2})",
            worker, alert.src_ip, alert.kind, alert.confidence
        );
        if self.alerts.len() < self.max_global_alerts {
            self.alerts.push(alert.clone());
        }
        if self.blocklist.add(&alert.src_ip, alert.timestamp) {
            info!(
                "blocked {} ({} detector, confidence {:.2})",
                alert.src_ip, alert.kind, alert.confidence
            );
            let _ = self
                .blocklist_tx
                .send(self.blocklist.snapshot(self.max_blocked_ips));
        }
    }

    fn handle_report(&mut self, report: WorkerReport, workers: usize) {
        self.metrics.accumulate(&report.metrics);
        self.workers_done += 1;
        info!(
            "worker {} completed ({}/{})",
            report.worker, self.workers_done, workers
        );
    }
}

/// Run the coordinator loop until every worker has reported, then drain any
/// alerts that were enqueued ahead of the final completion report.
pub(crate) async fn run_coordinator(
    config: &ClusterConfig,
    mut alert_rx: mpsc::Receiver<AlertEnvelope>,
    mut done_rx: mpsc::Receiver<WorkerReport>,
    blocklist_tx: watch::Sender<BlocklistUpdate>,
) -> CoordinatorOutcome {
    let workers = config.workers();
    let mut coordinator = Coordinator {
        alerts: Vec::new(),
        blocklist: Blocklist::new(config.max_blocked_ips),
        metrics: Metrics::default(),
        max_global_alerts: config.max_global_alerts,
        max_blocked_ips: config.max_blocked_ips,
        blocklist_tx,
        workers_done: 0,
    };

    while coordinator.workers_done < workers {
        tokio::select! {
            biased;
            Some(envelope) = alert_rx.recv() => {
                coordinator.handle_alert(envelope);
            }
            Some(report) = done_rx.recv() => {
                coordinator.handle_report(report, workers);
            }
            // Both channels closed means every worker is gone; a dead peer
            // cannot report, so stop waiting for it.
            else => break,
        }
    }

    // A worker enqueues all alerts before its completion report; anything
    // still buffered belongs to workers that just finished.
    while let Ok(envelope) = alert_rx.try_recv() {
        coordinator.handle_alert(envelope);
    }

    coordinator.metrics.average_across(workers);
    info!(
        "all {} workers completed: {} alerts, {} blocked IPs",
        workers,
        coordinator.alerts.len(),
        coordinator.blocklist.len()
    );

    let blocklist = coordinator.blocklist.snapshot(config.max_blocked_ips);
    CoordinatorOutcome {
        alerts: coordinator.alerts,
        blocklist,
        metrics: coordinator.metrics,
    }
}
