//! Statistical anomaly detectors
//!
//! All three detectors are pure functions from one window of flows to a
//! sequence of alerts. Per-IP aggregation preserves insertion order so that
//! tie-breaks are deterministic, and tracks at most
//! [`DetectionConfig::max_tracked_ips`] distinct sources per window; flows
//! from overflow IPs are ignored by every detector.

use indexmap::IndexMap;

use crate::types::{Alert, DetectionConfig, DetectorKind, FlowRecord};

/// Run all three detectors over one window, in a fixed order.
///
/// One IP may be flagged by several detectors in the same window; the
/// coordinator dedups at blocklist-insertion time.
pub fn run_detection(window: &[FlowRecord], config: &DetectionConfig) -> Vec<Alert> {
    let mut alerts = Vec::new();
    alerts.extend(detect_entropy(window, config));
    alerts.extend(detect_pca(window, config));
    alerts.extend(detect_cusum(window, config));
    alerts
}

/// Count per-source-IP occurrences in insertion order, up to the cap.
fn count_source_ips<'a>(
    window: &'a [FlowRecord],
    cap: usize,
) -> IndexMap<&'a str, usize> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for flow in window {
        if let Some(count) = counts.get_mut(flow.src_ip.as_str()) {
            *count += 1;
        } else if counts.len() < cap {
            counts.insert(flow.src_ip.as_str(), 1);
        }
    }
    counts
}

/// Shannon entropy of the source-IP distribution.
///
/// Probabilities divide by the window length; sources beyond the tracking
/// cap are simply absent from the sum.
pub fn source_ip_entropy(window: &[FlowRecord], cap: usize) -> f64 {
    let counts = count_source_ips(window, cap);
    let total = window.len() as f64;
    let mut entropy = 0.0;
    for &count in counts.values() {
        let p = count as f64 / total;
        if p > 0.0 {
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Entropy detector: concentrated sources mean low entropy. Emits at most
/// one alert per window, for the most frequent source IP (first seen wins
/// ties).
pub fn detect_entropy(window: &[FlowRecord], config: &DetectionConfig) -> Vec<Alert> {
    if window.len() < config.min_entropy_samples {
        return Vec::new();
    }

    let entropy = source_ip_entropy(window, config.max_tracked_ips);
    if entropy >= config.entropy_threshold {
        return Vec::new();
    }

    let counts = count_source_ips(window, config.max_tracked_ips);
    let Some((top_ip, _)) = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (&ip, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((ip, count)),
        })
    else {
        return Vec::new();
    };

    vec![Alert {
        src_ip: top_ip.to_owned(),
        timestamp: 0.0,
        kind: DetectorKind::Entropy,
        confidence: (config.entropy_threshold - entropy) / config.entropy_threshold,
    }]
}

struct FeatureAggregate {
    sums: [f64; 5],
    flows: usize,
}

/// Mahalanobis-style outlier detector over five per-IP average features:
/// bytes/s, total packets, flow duration, packet-length mean, IAT mean.
/// (The PCA name is historical; there is no eigen-decomposition.)
pub fn detect_pca(window: &[FlowRecord], config: &DetectionConfig) -> Vec<Alert> {
    let mut aggregates: IndexMap<&str, FeatureAggregate> = IndexMap::new();
    for flow in window {
        let features = [
            flow.flow_bytes_per_sec,
            flow.total_fwd_packets + flow.total_bwd_packets,
            flow.flow_duration,
            flow.packet_length_mean,
            flow.flow_iat_mean,
        ];
        if let Some(agg) = aggregates.get_mut(flow.src_ip.as_str()) {
            for (sum, value) in agg.sums.iter_mut().zip(features) {
                *sum += value;
            }
            agg.flows += 1;
        } else if aggregates.len() < config.max_tracked_ips {
            aggregates.insert(
                flow.src_ip.as_str(),
                FeatureAggregate { sums: features, flows: 1 },
            );
        }
    }
    if aggregates.is_empty() {
        return Vec::new();
    }

    // Mean and population stdev of the per-IP averages, per feature.
    let n = aggregates.len() as f64;
    let mut mean = [0.0f64; 5];
    let mut stddev = [0.0f64; 5];
    for f in 0..5 {
        for agg in aggregates.values() {
            mean[f] += agg.sums[f] / agg.flows as f64;
        }
        mean[f] /= n;
        for agg in aggregates.values() {
            let value = agg.sums[f] / agg.flows as f64;
            stddev[f] += (value - mean[f]) * (value - mean[f]);
        }
        stddev[f] = (stddev[f] / n).sqrt();
        if stddev[f] < 1e-6 {
            stddev[f] = 1.0;
        }
    }

    let mut alerts = Vec::new();
    for (&ip, agg) in &aggregates {
        let mut distance = 0.0;
        for f in 0..5 {
            let normalized = (agg.sums[f] / agg.flows as f64 - mean[f]) / stddev[f];
            distance += normalized * normalized;
        }
        let distance = distance.sqrt();
        if distance > config.pca_threshold {
            alerts.push(Alert {
                src_ip: ip.to_owned(),
                timestamp: 0.0,
                kind: DetectorKind::Pca,
                confidence: distance / config.pca_threshold,
            });
        }
    }
    alerts
}

struct RateAggregate {
    total_bytes_per_sec: f64,
    flows: usize,
}

/// Change-point detector on per-IP average byte rate against a fixed
/// baseline. Cumulative sums are fresh per window, so a single window's
/// deviation must clear the full threshold on its own. Only the upward sum
/// triggers; the downward sum is computed but does not alert.
pub fn detect_cusum(window: &[FlowRecord], config: &DetectionConfig) -> Vec<Alert> {
    let mut aggregates: IndexMap<&str, RateAggregate> = IndexMap::new();
    for flow in window {
        if let Some(agg) = aggregates.get_mut(flow.src_ip.as_str()) {
            agg.total_bytes_per_sec += flow.flow_bytes_per_sec;
            agg.flows += 1;
        } else if aggregates.len() < config.max_tracked_ips {
            aggregates.insert(
                flow.src_ip.as_str(),
                RateAggregate {
                    total_bytes_per_sec: flow.flow_bytes_per_sec,
                    flows: 1,
                },
            );
        }
    }

    let baseline = config.cusum_baseline;
    let slack = config.cusum_drift * baseline;
    let decision = config.cusum_threshold * baseline;

    let mut alerts = Vec::new();
    for (&ip, agg) in &aggregates {
        let avg_rate = agg.total_bytes_per_sec / agg.flows as f64;
        let deviation = avg_rate - baseline;
        let s_high = (deviation - slack).max(0.0);
        let _s_low = (-deviation - slack).max(0.0);
        if s_high > decision {
            alerts.push(Alert {
                src_ip: ip.to_owned(),
                timestamp: 0.0,
                kind: DetectorKind::Cusum,
                confidence: s_high / decision,
            });
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(src_ip: &str, is_attack: bool, bytes_per_sec: f64) -> FlowRecord {
        FlowRecord {
            src_ip: src_ip.to_owned(),
            dst_ip: "10.0.0.254".to_owned(),
            src_port: 1024,
            dst_port: 80,
            protocol: 17,
            flow_duration: 1000.0,
            total_fwd_packets: 10.0,
            total_bwd_packets: 5.0,
            total_fwd_bytes: 1500.0,
            total_bwd_bytes: 700.0,
            flow_bytes_per_sec: bytes_per_sec,
            flow_packets_per_sec: 15.0,
            min_packet_length: 40.0,
            max_packet_length: 1500.0,
            packet_length_mean: 740.5,
            packet_length_std: 120.3,
            flow_iat_mean: 88.1,
            flow_iat_std: 12.9,
            is_attack,
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig::default()
    }

    #[test]
    fn uniform_benign_traffic_raises_nothing() {
        let window: Vec<FlowRecord> = (1..=100)
            .map(|i| flow(&format!("10.1.2.{i}"), false, 1000.0))
            .collect();
        assert!(run_detection(&window, &config()).is_empty());
    }

    #[test]
    fn single_source_flood_triggers_entropy_and_cusum_but_not_pca() {
        let window: Vec<FlowRecord> = (0..100)
            .map(|_| flow("10.0.0.1", true, 1.0e7))
            .collect();
        let alerts = run_detection(&window, &config());

        let entropy: Vec<_> = alerts
            .iter()
            .filter(|a| a.kind == DetectorKind::Entropy)
            .collect();
        assert_eq!(entropy.len(), 1);
        assert_eq!(entropy[0].src_ip, "10.0.0.1");
        assert!((entropy[0].confidence - 1.0).abs() < 1e-12);

        // One IP means zero stdev, substituted by 1.0, so every z-score is 0.
        assert!(!alerts.iter().any(|a| a.kind == DetectorKind::Pca));

        let cusum: Vec<_> = alerts
            .iter()
            .filter(|a| a.kind == DetectorKind::Cusum)
            .collect();
        assert_eq!(cusum.len(), 1);
        let expected = (1.0e7 - 50_000.0 - 25_000.0) / 250_000.0;
        assert!((cusum[0].confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn mixed_traffic_flags_only_the_outlier() {
        let mut window: Vec<FlowRecord> = (0..900)
            .map(|i| flow(&format!("172.16.{}.{}", i / 250, i % 250), false, 1000.0))
            .collect();
        window.extend((0..100).map(|_| flow("10.0.0.1", true, 1.0e6)));

        let alerts = run_detection(&window, &config());
        assert!(!alerts.iter().any(|a| a.kind == DetectorKind::Entropy));

        let pca: Vec<_> = alerts.iter().filter(|a| a.kind == DetectorKind::Pca).collect();
        assert_eq!(pca.len(), 1);
        assert_eq!(pca[0].src_ip, "10.0.0.1");

        let cusum: Vec<_> = alerts.iter().filter(|a| a.kind == DetectorKind::Cusum).collect();
        assert_eq!(cusum.len(), 1);
        assert_eq!(cusum[0].src_ip, "10.0.0.1");
    }

    #[test]
    fn entropy_needs_minimum_samples() {
        let window: Vec<FlowRecord> = (0..5).map(|_| flow("10.0.0.1", true, 1.0e7)).collect();
        assert!(detect_entropy(&window, &config()).is_empty());
        // CUSUM has no minimum and still fires.
        assert_eq!(detect_cusum(&window, &config()).len(), 1);
    }

    #[test]
    fn empty_window_emits_nothing() {
        assert!(run_detection(&[], &config()).is_empty());
    }

    #[test]
    fn entropy_tie_break_prefers_first_seen() {
        let mut window = Vec::new();
        for _ in 0..5 {
            window.push(flow("9.9.9.1", false, 0.0));
            window.push(flow("9.9.9.2", false, 0.0));
        }
        let alerts = detect_entropy(&window, &config());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].src_ip, "9.9.9.1");
    }

    #[test]
    fn tracked_ip_cap_bounds_alert_count() {
        let mut cfg = config();
        cfg.max_tracked_ips = 3;
        // Every source exceeds the CUSUM decision threshold.
        let window: Vec<FlowRecord> = (0..10)
            .map(|i| flow(&format!("10.9.9.{i}"), true, 1.0e7))
            .collect();
        let alerts = detect_cusum(&window, &cfg);
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].src_ip, "10.9.9.0");
        assert_eq!(alerts[2].src_ip, "10.9.9.2");
    }

    #[test]
    fn zero_stdev_is_substituted_not_propagated() {
        // Identical feature vectors across many IPs: stdev is exactly zero
        // for every feature.
        let window: Vec<FlowRecord> = (0..20)
            .map(|i| flow(&format!("10.5.5.{i}"), false, 500.0))
            .collect();
        let alerts = detect_pca(&window, &config());
        assert!(alerts.is_empty());
        for alert in &alerts {
            assert!(alert.confidence.is_finite());
        }
    }

    #[test]
    fn entropy_of_single_source_is_zero() {
        let window: Vec<FlowRecord> = (0..50).map(|_| flow("8.8.8.8", true, 0.0)).collect();
        assert_eq!(source_ip_entropy(&window, 1000), 0.0);
    }
}
