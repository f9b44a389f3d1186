//! # Flowsentry Core
//!
//! Distributed, windowed DDoS detection over preprocessed flow logs. One
//! coordinator peer aggregates alerts and maintains the global blocklist;
//! worker peers each scan a disjoint partition of the input in fixed-size
//! windows through three statistical detectors (source-IP entropy,
//! Mahalanobis-style feature outliers, CUSUM byte-rate deviation) and score
//! every flow against the ground-truth labels carried inline.

#![warn(clippy::all)]

pub mod blocklist;
mod coordinator;
pub mod detection;
pub mod metrics;
pub mod protocol;
pub mod reader;
pub mod report;
pub mod rules;
pub mod types;
mod worker;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::types::{Alert, BlockedIp, ClusterConfig, Metrics};

/// Aggregated outcome of one cluster run, as seen by the coordinator.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dataset: PathBuf,
    /// Where the coordinator wrote its artifacts.
    pub output_dir: PathBuf,
    pub processes: usize,
    pub workers: usize,
    pub wall_time_secs: f64,
    /// Counters rolled up across all workers.
    pub metrics: Metrics,
    /// Global alert log, bounded by [`ClusterConfig::max_global_alerts`].
    pub alerts: Vec<Alert>,
    /// Final global blocklist in insertion order.
    pub blocklist: Vec<BlockedIp>,
}

/// Run the whole cluster to completion: partition the dataset across
/// `processes - 1` workers, coordinate detection, and write the report and
/// mitigation artifacts into the configured output directory.
pub async fn run_cluster(config: ClusterConfig) -> Result<RunSummary> {
    ensure!(
        config.processes >= 2,
        "need at least 2 peers (1 coordinator + 1 worker), got {}",
        config.processes
    );
    let workers = config.workers();
    info!(
        "starting detection cluster: 1 coordinator + {} workers over {}",
        workers,
        config.dataset.display()
    );

    let started = Instant::now();
    let dataset = config.dataset.clone();
    let total_lines = tokio::task::spawn_blocking(move || reader::count_data_lines(&dataset))
        .await
        .context("line-count task failed")?
        .with_context(|| format!("counting lines of {}", config.dataset.display()))?;
    info!("dataset has {} data lines", total_lines);

    let (alert_tx, alert_rx) = mpsc::channel(protocol::ALERT_CHANNEL_CAPACITY);
    let (done_tx, done_rx) = mpsc::channel(workers.max(1));
    let (blocklist_tx, blocklist_rx) = watch::channel(Vec::new());

    let mut worker_handles = Vec::with_capacity(workers);
    for worker_id in 1..=workers {
        let ctx = worker::WorkerContext {
            worker_id,
            workers,
            dataset: config.dataset.clone(),
            detection: config.detection.clone(),
            max_blocked_ips: config.max_blocked_ips,
            total_lines,
            alert_tx: alert_tx.clone(),
            blocklist_rx: blocklist_rx.clone(),
            done_tx: done_tx.clone(),
        };
        worker_handles.push(tokio::task::spawn_blocking(move || worker::run_worker(ctx)));
    }
    // The coordinator must observe channel closure if every worker is gone.
    drop(alert_tx);
    drop(done_tx);
    drop(blocklist_rx);

    let outcome = coordinator::run_coordinator(&config, alert_rx, done_rx, blocklist_tx).await;

    for handle in worker_handles {
        handle.await.context("worker task panicked")?;
    }

    let summary = RunSummary {
        dataset: config.dataset.clone(),
        output_dir: config.output_dir.clone(),
        processes: config.processes,
        workers,
        wall_time_secs: started.elapsed().as_secs_f64(),
        metrics: outcome.metrics,
        alerts: outcome.alerts,
        blocklist: outcome.blocklist,
    };

    write_artifacts(&config, &summary)?;
    Ok(summary)
}

/// Persist every coordinator-side artifact: results log, RTBH blocklist,
/// mitigation rules and the cumulative scalability summary.
fn write_artifacts(config: &ClusterConfig, summary: &RunSummary) -> Result<()> {
    let dir = &config.output_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    report::append_results(&dir.join("results.txt"), summary).context("appending results.txt")?;
    report::write_blocklist(
        &dir.join(format!("blocklist_{}_ranks.txt", summary.processes)),
        &summary.blocklist,
    )
    .context("writing blocklist file")?;
    rules::write_flowspec_rules(&dir.join("flowspec_rules.txt"), &summary.blocklist)
        .context("writing FlowSpec rules")?;
    rules::write_acl_rules(&dir.join("acl_rules.txt"), &summary.blocklist)
        .context("writing ACL rules")?;
    report::update_scalability_summary(&dir.join("scalability_results"), summary)
        .context("updating scalability summary")?;

    info!("artifacts written to {}", dir.display());
    Ok(())
}
