//! Report artifacts written by the coordinator
//!
//! Covers the append-only results log, the RTBH blocklist file and the
//! cumulative scalability summary, plus the top-attacker rollup consumed by
//! the CLI's stdout report.

use std::fs;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;

use crate::types::{Alert, BlockedIp};
use crate::RunSummary;

pub const SCALABILITY_HEADER: &str =
    "Workers,Processes,Throughput_pps,Latency_ms,MPI_Overhead_ms,Wall_Time_sec";

/// One row of the top-attackers table: alert count and mean confidence per
/// source IP.
#[derive(Debug, Clone, PartialEq)]
pub struct TopAttacker {
    pub ip: String,
    pub alerts: usize,
    pub avg_confidence: f64,
}

/// Rank source IPs by alert count, descending; ties keep first-seen order.
pub fn top_attackers(alerts: &[Alert], limit: usize) -> Vec<TopAttacker> {
    let mut per_ip: IndexMap<&str, (usize, f64)> = IndexMap::new();
    for alert in alerts {
        let entry = per_ip.entry(alert.src_ip.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += alert.confidence;
    }
    let mut ranked: Vec<TopAttacker> = per_ip
        .into_iter()
        .map(|(ip, (count, confidence_sum))| TopAttacker {
            ip: ip.to_owned(),
            alerts: count,
            avg_confidence: confidence_sum / count as f64,
        })
        .collect();
    ranked.sort_by(|a, b| b.alerts.cmp(&a.alerts));
    ranked.truncate(limit);
    ranked
}

/// Append one timestamped experiment block to the results log.
pub fn append_results(path: &Path, summary: &RunSummary) -> std::io::Result<()> {
    let metrics = &summary.metrics;
    let rates = metrics.derived();
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;

    writeln!(
        file,
        "\n=== Experiment Run: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(file, "Processes: {}", summary.processes)?;
    writeln!(file, "Total Flows: {}", metrics.total_flows)?;
    writeln!(
        file,
        "TP={}, FP={}, TN={}, FN={}",
        metrics.true_positives,
        metrics.false_positives,
        metrics.true_negatives,
        metrics.false_negatives
    )?;
    writeln!(
        file,
        "Precision: {:.4}, Recall: {:.4}, F1: {:.4}",
        rates.precision, rates.recall, rates.f1
    )?;
    writeln!(
        file,
        "FPR: {:.4}, Accuracy: {:.4}",
        rates.false_positive_rate, rates.accuracy
    )?;
    writeln!(
        file,
        "Blocked: {}, Collateral: {}",
        metrics.blocked_flows, metrics.legitimate_blocked
    )?;
    writeln!(
        file,
        "Throughput: {:.2} flows/sec",
        metrics.throughput_flows_per_sec
    )?;
    writeln!(file, "Avg Latency: {:.4} ms", metrics.avg_latency_ms())?;
    writeln!(
        file,
        "Detection Lead Time: {:.4} ms",
        metrics.detection_lead_time_ms
    )?;
    writeln!(file, "=====================================")?;
    Ok(())
}

/// Write the RTBH blocklist, one `ip (blocked at <time>)` line per entry.
pub fn write_blocklist(path: &Path, blocklist: &[BlockedIp]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    writeln!(file, "=== BLOCKED IPs ===")?;
    for entry in blocklist {
        writeln!(file, "{} (blocked at {:.2})", entry.ip, entry.blocked_time)?;
    }
    Ok(())
}

/// Read-modify-write the cumulative scalability summary: update the row for
/// this worker count or append a new one.
pub fn update_scalability_summary(dir: &Path, summary: &RunSummary) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join("scalability_summary.csv");

    let metrics = &summary.metrics;
    let row = format!(
        "{},{},{:.2},{:.4},{:.2},{:.2}",
        summary.workers,
        summary.processes,
        metrics.throughput_flows_per_sec,
        metrics.avg_latency_ms(),
        metrics.comm_time_ms,
        summary.wall_time_secs
    );

    let mut lines: Vec<String> = match fs::read_to_string(&path) {
        Ok(existing) => existing.lines().map(str::to_owned).collect(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            vec![SCALABILITY_HEADER.to_owned()]
        }
        Err(err) => return Err(err),
    };

    let mut found = false;
    for line in lines.iter_mut().skip(1) {
        let first = line.split(',').next().unwrap_or("");
        if first.parse::<usize>() == Ok(summary.workers) {
            *line = row.clone();
            found = true;
            break;
        }
    }
    if !found {
        lines.push(row);
    }

    fs::write(&path, lines.join("\n") + "\n")
}
