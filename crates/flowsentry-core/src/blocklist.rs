//! RTBH-style blocklist of source IPs
//!
//! The coordinator owns the authoritative instance; each worker mirrors it
//! and swaps its mirror atomically whenever a broadcast arrives. Entries are
//! kept in insertion order so snapshots and rule files are stable.

use indexmap::IndexMap;

use crate::types::BlockedIp;

/// Bounded, ordered, dedup'd set of blocked source IPs.
#[derive(Debug, Clone)]
pub struct Blocklist {
    entries: IndexMap<String, f64>,
    capacity: usize,
}

impl Blocklist {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
        }
    }

    /// Insert an IP unless it is already present or the list is full.
    /// Returns whether the entry was inserted.
    pub fn add(&mut self, ip: &str, blocked_time: f64) -> bool {
        if self.entries.contains_key(ip) || self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.insert(ip.to_owned(), blocked_time);
        true
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.entries.contains_key(ip)
    }

    /// Atomically replace the whole list with a pushed update.
    pub fn replace_all(&mut self, update: Vec<BlockedIp>) {
        self.entries.clear();
        for entry in update {
            if self.entries.len() >= self.capacity {
                break;
            }
            self.entries.entry(entry.ip).or_insert(entry.blocked_time);
        }
    }

    /// Copy up to `cap` entries, oldest first.
    pub fn snapshot(&self, cap: usize) -> Vec<BlockedIp> {
        self.entries
            .iter()
            .take(cap)
            .map(|(ip, &blocked_time)| BlockedIp {
                ip: ip.clone(),
                blocked_time,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
