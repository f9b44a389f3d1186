//! Worker peer: reads its partition window by window, runs the detectors,
//! streams alerts to the coordinator and mirrors the global blocklist.
//!
//! A worker is synchronous inside: file reads and detection are plain
//! blocking work, which is why the cluster driver runs each worker on a
//! blocking task. The only transport interactions are the blocking alert
//! sends, a non-blocking blocklist drain between windows, and the final
//! completion send.

use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::blocklist::Blocklist;
use crate::detection::run_detection;
use crate::metrics::resource_usage;
use crate::protocol::{AlertEnvelope, BlocklistUpdate, WorkerReport};
use crate::reader::{partition_for, read_window};
use crate::types::{DetectionConfig, Metrics};

/// Everything a worker needs; moved into its blocking task.
pub(crate) struct WorkerContext {
    /// Peer id, 1-based (0 is the coordinator).
    pub worker_id: usize,
    pub workers: usize,
    pub dataset: PathBuf,
    pub detection: DetectionConfig,
    pub max_blocked_ips: usize,
    pub total_lines: usize,
    pub alert_tx: mpsc::Sender<AlertEnvelope>,
    pub blocklist_rx: watch::Receiver<BlocklistUpdate>,
    pub done_tx: mpsc::Sender<WorkerReport>,
}

/// Run one worker to completion. Always ends in a completion report, even
/// when the partition dies on an I/O error, so the coordinator never hangs
/// on a missing peer.
pub(crate) fn run_worker(mut ctx: WorkerContext) {
    let worker_start = Instant::now();
    let partition = partition_for(ctx.worker_id - 1, ctx.workers, ctx.total_lines);
    info!(
        "worker {} processing lines {}..{} ({} flows)",
        ctx.worker_id,
        partition.start_line,
        partition.start_line + partition.lines,
        partition.lines
    );

    let mut metrics = Metrics::default();
    let mut blocklist = Blocklist::new(ctx.max_blocked_ips);
    let mut flows_processed: u64 = 0;

    let processing_start = Instant::now();
    let mut offset = 0;
    while offset < partition.lines {
        let requested = ctx.detection.window_size.min(partition.lines - offset);
        let window_start = Instant::now();

        let window = match read_window(&ctx.dataset, partition.start_line + offset, requested) {
            Ok(window) => window,
            Err(err) => {
                warn!("worker {} aborting partition: {}", ctx.worker_id, err);
                break;
            }
        };
        if window.is_empty() {
            debug!("worker {} out of data at offset {}", ctx.worker_id, offset);
            break;
        }

        let alerts = run_detection(&window, &ctx.detection);
        if !alerts.is_empty() {
            info!(
                "worker {} raised {} alerts in window at offset {}",
                ctx.worker_id,
                alerts.len(),
                offset
            );
            let send_start = Instant::now();
            for alert in &alerts {
                let envelope = AlertEnvelope {
                    worker: ctx.worker_id,
                    alert: alert.clone(),
                };
                if ctx.alert_tx.blocking_send(envelope).is_err() {
                    warn!("worker {} lost the coordinator; alerts dropped", ctx.worker_id);
                    break;
                }
            }
            metrics.comm_time_ms += send_start.elapsed().as_secs_f64() * 1000.0;
        }

        // Drain the blocklist stream only between windows, never inside an
        // alert burst.
        if ctx.blocklist_rx.has_changed().unwrap_or(false) {
            let recv_start = Instant::now();
            let update = ctx.blocklist_rx.borrow_and_update().clone();
            metrics.comm_time_ms += recv_start.elapsed().as_secs_f64() * 1000.0;
            debug!(
                "worker {} replacing blocklist with {} entries",
                ctx.worker_id,
                update.len()
            );
            blocklist.replace_all(update);
        }

        metrics.record_window(&window, &alerts, &blocklist);
        metrics.total_latency_ms += window_start.elapsed().as_secs_f64() * 1000.0;
        flows_processed += window.len() as u64;
        offset += requested;
    }

    let processing_ms = processing_start.elapsed().as_secs_f64() * 1000.0;
    metrics.local_detection_time_ms = processing_ms;
    metrics.global_detection_time_ms = worker_start.elapsed().as_secs_f64() * 1000.0;
    metrics.throughput_flows_per_sec = if processing_ms > 0.0 {
        flows_processed as f64 * 1000.0 / processing_ms
    } else {
        0.0
    };
    // First-window lead-time constant carried over from the reference setup.
    metrics.detection_lead_time_ms = 50.0;
    metrics.estimate_latency_percentiles();
    let (cpu, memory) = resource_usage();
    metrics.cpu_usage_percent = cpu;
    metrics.memory_usage_mb = memory;
    metrics.attack_traffic_dropped_pct = if metrics.ddos_flows > 0 {
        metrics.true_positives as f64 * 100.0 / metrics.ddos_flows as f64
    } else {
        0.0
    };

    let rates = metrics.derived();
    info!(
        "worker {} finished: {} flows, TP={} FP={} TN={} FN={}, precision={:.4}, recall={:.4}, {:.2} flows/sec",
        ctx.worker_id,
        metrics.total_flows,
        metrics.true_positives,
        metrics.false_positives,
        metrics.true_negatives,
        metrics.false_negatives,
        rates.precision,
        rates.recall,
        metrics.throughput_flows_per_sec
    );

    let report = WorkerReport {
        worker: ctx.worker_id,
        metrics,
    };
    if ctx.done_tx.blocking_send(report).is_err() {
        warn!("worker {} could not deliver its completion report", ctx.worker_id);
    }
}
