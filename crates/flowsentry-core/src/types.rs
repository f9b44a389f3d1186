//! Core data types for the distributed DDoS detection pipeline

use serde::{Deserialize, Serialize};

/// Significant length of an opaque IP label; longer labels are truncated.
pub const MAX_IP_LEN: usize = 31;

/// One preprocessed network flow, parsed from a single CSV line.
///
/// Fields mirror the consumed columns of the CIC-DDoS2019-style layout.
/// Records live for the duration of one window and never cross worker
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: i32,
    pub dst_port: i32,
    pub protocol: i32,
    pub flow_duration: f64,
    pub total_fwd_packets: f64,
    pub total_bwd_packets: f64,
    pub total_fwd_bytes: f64,
    pub total_bwd_bytes: f64,
    pub flow_bytes_per_sec: f64,
    pub flow_packets_per_sec: f64,
    pub min_packet_length: f64,
    pub max_packet_length: f64,
    pub packet_length_mean: f64,
    pub packet_length_std: f64,
    pub flow_iat_mean: f64,
    pub flow_iat_std: f64,
    /// Ground truth derived from the label column.
    pub is_attack: bool,
}

/// Which detector raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorKind {
    Entropy = 1,
    Pca = 2,
    Cusum = 3,
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorKind::Entropy => write!(f, "entropy"),
            DetectorKind::Pca => write!(f, "pca"),
            DetectorKind::Cusum => write!(f, "cusum"),
        }
    }
}

/// Detection result emitted by one detector for one window.
///
/// `timestamp` is carried for blocklist bookkeeping but is always 0.0: flow
/// records hold no capture time, so the scalar is reserved rather than used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub src_ip: String,
    pub timestamp: f64,
    pub kind: DetectorKind,
    /// Margin over the detector's threshold, typically > 1.0.
    pub confidence: f64,
}

/// One entry of the (global or mirrored) blocklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedIp {
    pub ip: String,
    pub blocked_time: f64,
}

/// Detector thresholds and window geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Flows per analysis window.
    pub window_size: usize,
    /// Entropy detection needs at least this many flows in a window.
    pub min_entropy_samples: usize,
    /// Distinct source IPs tracked per window; overflow IPs are ignored.
    pub max_tracked_ips: usize,
    /// Shannon entropy below this triggers the entropy detector.
    pub entropy_threshold: f64,
    /// Z-scored feature-space distance above this triggers the PCA detector.
    pub pca_threshold: f64,
    /// Baseline average bytes/s per flow (B).
    pub cusum_baseline: f64,
    /// Allowable drift as a fraction of the baseline (K).
    pub cusum_drift: f64,
    /// Decision threshold as a multiple of the baseline (H).
    pub cusum_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_size: 50_000,
            min_entropy_samples: 10,
            max_tracked_ips: 1000,
            entropy_threshold: 1.5,
            pca_threshold: 3.0,
            cusum_baseline: 50_000.0,
            cusum_drift: 0.5,
            cusum_threshold: 5.0,
        }
    }
}

/// Cluster-wide configuration: one coordinator plus `processes - 1` workers.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Preprocessed flow CSV to analyze.
    pub dataset: std::path::PathBuf,
    /// Total peer count, coordinator included. Must be at least 2.
    pub processes: usize,
    /// Directory receiving report and rule artifacts.
    pub output_dir: std::path::PathBuf,
    pub detection: DetectionConfig,
    /// Global blocklist capacity; further insertions are dropped.
    pub max_blocked_ips: usize,
    /// Global alert log capacity; further alerts are dropped from the log.
    pub max_global_alerts: usize,
}

impl ClusterConfig {
    pub fn new(dataset: impl Into<std::path::PathBuf>, processes: usize) -> Self {
        Self {
            dataset: dataset.into(),
            processes,
            output_dir: std::path::PathBuf::from("."),
            detection: DetectionConfig::default(),
            max_blocked_ips: 1000,
            max_global_alerts: 10_000,
        }
    }

    pub fn workers(&self) -> usize {
        self.processes.saturating_sub(1)
    }
}

/// Flat per-worker performance and accuracy counters.
///
/// Integer counters are summed during aggregation; cpu, percentile and
/// drop-rate fields are averaged across workers at report time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
    pub total_flows: u64,
    pub blocked_flows: u64,
    /// Collateral damage: benign flows whose source was blocked.
    pub legitimate_blocked: u64,
    pub ddos_flows: u64,
    pub benign_flows: u64,
    pub total_latency_ms: f64,
    pub detection_lead_time_ms: f64,
    pub throughput_flows_per_sec: f64,
    /// Time spent in channel sends/receives (transport overhead).
    pub comm_time_ms: f64,
    /// Pure window-processing time.
    pub local_detection_time_ms: f64,
    /// End-to-end worker time including startup.
    pub global_detection_time_ms: f64,
    pub cpu_usage_percent: f64,
    pub memory_usage_mb: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub attack_traffic_dropped_pct: f64,
}

/// Rates derived from the confusion matrix, all with the 0/0 -> 0 convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedRates {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub false_positive_rate: f64,
    pub accuracy: f64,
}
