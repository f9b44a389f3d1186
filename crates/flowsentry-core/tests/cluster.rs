//! End-to-end cluster runs over synthetic flow logs.

use std::fs;
use std::io::Write;
use std::path::Path;

use flowsentry_core::types::ClusterConfig;
use flowsentry_core::{run_cluster, RunSummary};

fn flow_line(src_ip: &str, bytes_per_sec: f64, label: &str) -> String {
    format!(
        "{src_ip},1024,10.0.0.254,80,17,1000.0,10,5,1500,700,{bytes_per_sec},15.0,40,1500,740.5,120.3,88.1,12.9,{label}"
    )
}

fn write_dataset(dir: &Path, lines: &[String]) -> std::path::PathBuf {
    let path = dir.join("flows.csv");
    let mut file = fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    path
}

fn config_for(dir: &Path, dataset: &Path, processes: usize) -> ClusterConfig {
    let mut config = ClusterConfig::new(dataset, processes);
    config.output_dir = dir.join("out");
    config
}

fn assert_confusion_partition(summary: &RunSummary) {
    let m = &summary.metrics;
    assert_eq!(
        m.true_positives + m.false_positives + m.true_negatives + m.false_negatives,
        m.total_flows
    );
    assert_eq!(m.ddos_flows + m.benign_flows, m.total_flows);
}

#[tokio::test]
async fn uniform_benign_traffic_raises_no_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (1..=100)
        .map(|i| flow_line(&format!("10.20.30.{i}"), 1000.0, "BENIGN"))
        .collect();
    let dataset = write_dataset(dir.path(), &lines);

    let summary = run_cluster(config_for(dir.path(), &dataset, 2)).await.unwrap();

    assert!(summary.alerts.is_empty());
    assert!(summary.blocklist.is_empty());
    assert_eq!(summary.metrics.total_flows, 100);
    assert_eq!(summary.metrics.true_negatives, 100);
    assert_eq!(summary.metrics.true_positives, 0);
    assert_eq!(summary.metrics.false_positives, 0);
    assert_eq!(summary.metrics.false_negatives, 0);
    assert_confusion_partition(&summary);
}

#[tokio::test]
async fn single_source_flood_is_detected_and_blocked() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..100)
        .map(|_| flow_line("10.0.0.1", 1.0e7, "DrDoS_DNS"))
        .collect();
    let dataset = write_dataset(dir.path(), &lines);

    let summary = run_cluster(config_for(dir.path(), &dataset, 2)).await.unwrap();

    // Entropy (confidence 1.0) and CUSUM both fire; PCA cannot with one IP.
    assert_eq!(summary.alerts.len(), 2);
    assert!(summary.alerts.iter().all(|a| a.src_ip == "10.0.0.1"));
    assert_eq!(summary.blocklist.len(), 1);
    assert_eq!(summary.blocklist[0].ip, "10.0.0.1");
    assert_eq!(summary.metrics.true_positives, 100);
    assert_eq!(summary.metrics.false_negatives, 0);
    assert_confusion_partition(&summary);
}

#[tokio::test]
async fn mixed_traffic_flags_only_the_attacker() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines: Vec<String> = (0..900)
        .map(|i| flow_line(&format!("172.16.{}.{}", i / 250, i % 250), 1000.0, "BENIGN"))
        .collect();
    lines.extend((0..100).map(|_| flow_line("10.0.0.1", 1.0e6, "DrDoS_LDAP")));
    let dataset = write_dataset(dir.path(), &lines);

    let summary = run_cluster(config_for(dir.path(), &dataset, 2)).await.unwrap();

    assert!(summary.alerts.iter().all(|a| a.src_ip == "10.0.0.1"));
    assert_eq!(summary.blocklist.len(), 1);
    assert_eq!(summary.metrics.true_positives, 100);
    assert_eq!(summary.metrics.false_positives, 0);
    assert_eq!(summary.metrics.legitimate_blocked, 0);
    assert_confusion_partition(&summary);
}

#[tokio::test]
async fn header_line_is_consumed_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = vec!["Unnamed: 0,Source IP,Source Port,...".to_owned()];
    lines.extend((1..=10).map(|i| flow_line(&format!("10.1.1.{i}"), 1000.0, "BENIGN")));
    let dataset = write_dataset(dir.path(), &lines);

    let summary = run_cluster(config_for(dir.path(), &dataset, 2)).await.unwrap();
    assert_eq!(summary.metrics.total_flows, 10);
}

#[tokio::test]
async fn partitions_cover_the_dataset_and_matrices_sum() {
    let dir = tempfile::tempdir().unwrap();
    // 1000 flows, 3 workers: partitions [0,333), [333,666), [666,1000).
    let mut lines = Vec::new();
    for i in 0..900 {
        lines.push(flow_line(&format!("172.16.{}.{}", i / 250, i % 250), 1000.0, "BENIGN"));
    }
    for _ in 0..100 {
        lines.push(flow_line("10.0.0.1", 1.0e7, "DrDoS_NTP"));
    }
    let dataset = write_dataset(dir.path(), &lines);

    let summary = run_cluster(config_for(dir.path(), &dataset, 4)).await.unwrap();

    assert_eq!(summary.workers, 3);
    assert_eq!(summary.metrics.total_flows, 1000);
    assert_eq!(summary.metrics.ddos_flows, 100);
    assert_eq!(summary.metrics.benign_flows, 900);
    assert_confusion_partition(&summary);
    // The attacker partition detects the flood via CUSUM at minimum.
    assert_eq!(summary.blocklist.len(), 1);
    assert_eq!(summary.blocklist[0].ip, "10.0.0.1");
}

#[tokio::test]
async fn more_workers_than_lines_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let lines = vec![
        flow_line("10.0.0.1", 1000.0, "BENIGN"),
        flow_line("10.0.0.2", 1000.0, "BENIGN"),
    ];
    let dataset = write_dataset(dir.path(), &lines);

    let summary = run_cluster(config_for(dir.path(), &dataset, 6)).await.unwrap();
    assert_eq!(summary.workers, 5);
    assert_eq!(summary.metrics.total_flows, 2);
    assert_confusion_partition(&summary);
}

#[tokio::test]
async fn multi_window_runs_keep_the_blocklist_deduped() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..500)
        .map(|_| flow_line("10.0.0.1", 1.0e7, "DrDoS_DNS"))
        .collect();
    let dataset = write_dataset(dir.path(), &lines);

    let mut config = config_for(dir.path(), &dataset, 2);
    // Small windows force repeated detection of the same source.
    config.detection.window_size = 50;
    let summary = run_cluster(config).await.unwrap();

    assert!(summary.alerts.len() >= 10);
    assert_eq!(summary.blocklist.len(), 1);
    assert_eq!(summary.metrics.total_flows, 500);
    assert_confusion_partition(&summary);
}

#[tokio::test]
async fn coordinator_writes_all_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let lines: Vec<String> = (0..50)
        .map(|_| flow_line("10.0.0.1", 1.0e7, "DrDoS_DNS"))
        .collect();
    let dataset = write_dataset(dir.path(), &lines);

    let config = config_for(dir.path(), &dataset, 3);
    let out = config.output_dir.clone();
    run_cluster(config).await.unwrap();

    assert!(out.join("results.txt").exists());
    assert!(out.join("blocklist_3_ranks.txt").exists());
    assert!(out.join("flowspec_rules.txt").exists());
    assert!(out.join("acl_rules.txt").exists());

    let csv = fs::read_to_string(out.join("scalability_results/scalability_summary.csv")).unwrap();
    assert!(csv.starts_with("Workers,Processes,Throughput_pps,Latency_ms,MPI_Overhead_ms,Wall_Time_sec"));
    assert!(csv.lines().nth(1).unwrap().starts_with("2,3,"));

    let blocklist = fs::read_to_string(out.join("blocklist_3_ranks.txt")).unwrap();
    assert!(blocklist.contains("10.0.0.1 (blocked at"));
    let acl = fs::read_to_string(out.join("acl_rules.txt")).unwrap();
    assert!(acl.contains("deny ip host 10.0.0.1 any"));
}

#[tokio::test]
async fn rejects_too_few_peers() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = write_dataset(dir.path(), &[flow_line("10.0.0.1", 0.0, "BENIGN")]);
    let err = run_cluster(config_for(dir.path(), &dataset, 1)).await.unwrap_err();
    assert!(err.to_string().contains("at least 2 peers"));
}

#[tokio::test]
async fn missing_dataset_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    let err = run_cluster(config_for(dir.path(), &missing, 2)).await.unwrap_err();
    assert!(err.to_string().contains("counting lines"));
}
