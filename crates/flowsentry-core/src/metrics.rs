//! Ground-truth evaluation and performance accounting
//!
//! Workers score every window against the labels carried inline in the
//! input; the coordinator rolls the per-worker counters up element-wise.

use indexmap::IndexSet;
use sysinfo::System;

use crate::blocklist::Blocklist;
use crate::types::{Alert, DerivedRates, FlowRecord, Metrics};

/// Distinct detected source IPs considered per window; extras are ignored.
const MAX_DETECTED_IPS: usize = 100;

impl Metrics {
    /// Score one window: update the confusion matrix, traffic-class counts
    /// and blocking counters from `(flows, alerts, blocklist)`.
    pub fn record_window(&mut self, flows: &[FlowRecord], alerts: &[Alert], blocklist: &Blocklist) {
        let mut detected_ips: IndexSet<&str> = IndexSet::new();
        for alert in alerts {
            if detected_ips.len() >= MAX_DETECTED_IPS {
                break;
            }
            detected_ips.insert(alert.src_ip.as_str());
        }

        for flow in flows {
            self.total_flows += 1;
            if flow.is_attack {
                self.ddos_flows += 1;
            } else {
                self.benign_flows += 1;
            }

            let was_detected = detected_ips.contains(flow.src_ip.as_str());
            let was_blocked = blocklist.contains(&flow.src_ip);
            if was_blocked {
                self.blocked_flows += 1;
            }

            match (flow.is_attack, was_detected) {
                (true, true) => self.true_positives += 1,
                (false, true) => self.false_positives += 1,
                (false, false) => self.true_negatives += 1,
                (true, false) => self.false_negatives += 1,
            }

            if !flow.is_attack && was_blocked {
                self.legitimate_blocked += 1;
            }
        }
    }

    /// Element-wise rollup of a worker's counters into this accumulator.
    /// Lead time is taken as-is rather than summed; cpu, percentile and
    /// drop-rate fields are summed here and averaged by
    /// [`Metrics::average_across`].
    pub fn accumulate(&mut self, other: &Metrics) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.true_negatives += other.true_negatives;
        self.false_negatives += other.false_negatives;
        self.total_flows += other.total_flows;
        self.blocked_flows += other.blocked_flows;
        self.legitimate_blocked += other.legitimate_blocked;
        self.ddos_flows += other.ddos_flows;
        self.benign_flows += other.benign_flows;
        self.total_latency_ms += other.total_latency_ms;
        self.detection_lead_time_ms = other.detection_lead_time_ms;
        self.throughput_flows_per_sec += other.throughput_flows_per_sec;
        self.comm_time_ms += other.comm_time_ms;
        self.local_detection_time_ms += other.local_detection_time_ms;
        self.global_detection_time_ms += other.global_detection_time_ms;
        self.cpu_usage_percent += other.cpu_usage_percent;
        self.memory_usage_mb += other.memory_usage_mb;
        self.latency_p95_ms += other.latency_p95_ms;
        self.latency_p99_ms += other.latency_p99_ms;
        self.attack_traffic_dropped_pct += other.attack_traffic_dropped_pct;
    }

    /// Average the fields that are per-worker gauges rather than sums.
    pub fn average_across(&mut self, workers: usize) {
        if workers == 0 {
            return;
        }
        let n = workers as f64;
        self.cpu_usage_percent /= n;
        self.latency_p95_ms /= n;
        self.latency_p99_ms /= n;
        self.attack_traffic_dropped_pct /= n;
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.total_flows == 0 {
            0.0
        } else {
            self.total_latency_ms / self.total_flows as f64
        }
    }

    /// Latency percentiles synthesized from the average; estimates, not
    /// measured quantiles.
    pub fn estimate_latency_percentiles(&mut self) {
        let avg = self.avg_latency_ms();
        self.latency_p95_ms = avg * 1.2;
        self.latency_p99_ms = avg * 2.0;
    }

    pub fn derived(&self) -> DerivedRates {
        let tp = self.true_positives as f64;
        let fp = self.false_positives as f64;
        let tn = self.true_negatives as f64;
        let fn_ = self.false_negatives as f64;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = ratio(2.0 * precision * recall, precision + recall);
        DerivedRates {
            precision,
            recall,
            f1,
            false_positive_rate: ratio(fp, fp + tn),
            accuracy: ratio(tp + tn, tp + tn + fp + fn_),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Sample this process's CPU share and resident memory. Two refreshes with a
/// short gap are needed before the cpu delta means anything.
pub fn resource_usage() -> (f64, f64) {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return (0.0, 0.0);
    };
    let mut sys = System::new();
    sys.refresh_process(pid);
    std::thread::sleep(std::time::Duration::from_millis(200));
    sys.refresh_process(pid);
    match sys.process(pid) {
        Some(process) => (
            f64::from(process.cpu_usage()),
            process.memory() as f64 / (1024.0 * 1024.0),
        ),
        None => (0.0, 0.0),
    }
}
