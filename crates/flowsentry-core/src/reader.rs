//! Flow-log parsing, partitioning and window reading
//!
//! The input is a line-delimited CSV with the 19-column preprocessed layout
//! (source/destination endpoints, per-flow statistics, ground-truth label).
//! Workers never share file handles: each window read opens the file anew
//! with a large buffer, skips to the partition's line range and parses up to
//! one window of records.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{FlowRecord, MAX_IP_LEN};

/// Number of comma-separated columns a data line must provide.
pub const FIELD_COUNT: usize = 19;
/// Lines shorter than this are rejected outright.
pub const MIN_LINE_LEN: usize = 10;
/// Per-field length cap; longer fields are truncated silently.
pub const MAX_FIELD_LEN: usize = 255;
/// Read buffer for window reads.
const READ_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single line failed to parse. Failed lines are skipped and counted
/// toward neither numerator nor denominator of any metric.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line shorter than {MIN_LINE_LEN} bytes")]
    TooShort,
    #[error("expected {FIELD_COUNT} fields, found {found}")]
    MissingFields { found: usize },
}

/// Contiguous line range of the input assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub start_line: usize,
    pub lines: usize,
}

/// Split `total_lines` data lines evenly across `workers`; the final
/// partition absorbs the remainder.
pub fn partition_for(worker_index: usize, workers: usize, total_lines: usize) -> Partition {
    let lines_per_worker = total_lines / workers;
    let start_line = worker_index * lines_per_worker;
    let lines = if worker_index == workers - 1 {
        total_lines - start_line
    } else {
        lines_per_worker
    };
    Partition { start_line, lines }
}

/// Count data lines, excluding a single leading header line whose first byte
/// is `U` ("Unnamed", the preprocessing artifact). Only the first line is a
/// header candidate; malformed lines still count, since partition ranges are
/// expressed in raw lines.
pub fn count_data_lines(path: &Path) -> Result<usize, ReaderError> {
    let file = File::open(path).map_err(|source| ReaderError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(READ_BUF_SIZE, file);

    let mut buf = Vec::new();
    let mut count = 0usize;
    let mut first = true;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| ReaderError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        if first {
            first = false;
            if buf.first() == Some(&b'U') {
                continue;
            }
        }
        count += 1;
    }
    Ok(count)
}

/// Read up to `max_records` flows from the data-line range
/// `[start_line, start_line + max_records)`.
///
/// Malformed lines consume a slot of the line range but not of the output,
/// so a window may come back short even before EOF. An empty result
/// terminates the caller's window stream.
pub fn read_window(
    path: &Path,
    start_line: usize,
    max_records: usize,
) -> Result<Vec<FlowRecord>, ReaderError> {
    let file = File::open(path).map_err(|source| ReaderError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(READ_BUF_SIZE, file);

    let end_line = start_line + max_records;
    let mut out = Vec::new();
    let mut buf = Vec::new();
    let mut line_index = 0usize;
    let mut first = true;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| ReaderError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        if first {
            first = false;
            if buf.first() == Some(&b'U') {
                continue;
            }
        }
        if line_index >= end_line {
            break;
        }
        if line_index >= start_line {
            let line = String::from_utf8_lossy(&buf);
            if let Ok(record) = parse_flow_line(&line) {
                out.push(record);
            }
        }
        line_index += 1;
        if out.len() >= max_records {
            break;
        }
    }
    Ok(out)
}

/// Parse one CSV line into a [`FlowRecord`].
///
/// Numeric columns follow C `atoi`/`atof` semantics: leading whitespace is
/// accepted, parsing stops at the first character that does not extend a
/// number, and an empty field yields zero. The label column is matched by
/// case-sensitive substring against "DDoS" and "DrDoS".
pub fn parse_flow_line(line: &str) -> Result<FlowRecord, ParseError> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.len() < MIN_LINE_LEN {
        return Err(ParseError::TooShort);
    }
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < FIELD_COUNT {
        return Err(ParseError::MissingFields {
            found: fields.len(),
        });
    }

    let field = |i: usize| clip(fields[i], MAX_FIELD_LEN);
    let label = field(18);

    Ok(FlowRecord {
        src_ip: clip(fields[0], MAX_IP_LEN).to_owned(),
        dst_ip: clip(fields[2], MAX_IP_LEN).to_owned(),
        src_port: parse_int_prefix(field(1)),
        dst_port: parse_int_prefix(field(3)),
        protocol: parse_int_prefix(field(4)),
        flow_duration: parse_float_prefix(field(5)),
        total_fwd_packets: parse_float_prefix(field(6)),
        total_bwd_packets: parse_float_prefix(field(7)),
        total_fwd_bytes: parse_float_prefix(field(8)),
        total_bwd_bytes: parse_float_prefix(field(9)),
        flow_bytes_per_sec: parse_float_prefix(field(10)),
        flow_packets_per_sec: parse_float_prefix(field(11)),
        min_packet_length: parse_float_prefix(field(12)),
        max_packet_length: parse_float_prefix(field(13)),
        packet_length_mean: parse_float_prefix(field(14)),
        packet_length_std: parse_float_prefix(field(15)),
        flow_iat_mean: parse_float_prefix(field(16)),
        flow_iat_std: parse_float_prefix(field(17)),
        is_attack: label.contains("DrDoS") || label.contains("DDoS"),
    })
}

/// Truncate a field to `max` bytes without splitting a UTF-8 character.
fn clip(field: &str, max: usize) -> &str {
    if field.len() <= max {
        return field;
    }
    let mut end = max;
    while !field.is_char_boundary(end) {
        end -= 1;
    }
    &field[..end]
}

/// C `atoi`: optional leading whitespace and sign, then the longest digit
/// prefix. Empty or non-numeric input yields 0.
fn parse_int_prefix(field: &str) -> i32 {
    let s = field.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut negative = false;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        negative = bytes[i] == b'-';
        i += 1;
    }
    let mut value: i64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((bytes[i] - b'0') as i64);
        i += 1;
    }
    if negative {
        value = -value;
    }
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// C `atof`: the longest prefix shaped like `[+-]digits[.digits][e[+-]digits]`.
/// Empty or non-numeric input yields 0.0.
fn parse_float_prefix(field: &str) -> f64 {
    let s = field.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut saw_digit = false;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        saw_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            saw_digit = true;
        }
    }
    if saw_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            end = exp;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }
    if !saw_digit {
        return 0.0;
    }
    s[..end].parse().unwrap_or(0.0)
}
