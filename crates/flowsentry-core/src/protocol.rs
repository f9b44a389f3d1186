//! Coordinator/worker message classes
//!
//! Three message classes connect the peers, mirroring the tagged topology of
//! the reference design: alerts stream worker-to-coordinator over a shared
//! bounded channel, blocklist updates fan out coordinator-to-workers over a
//! watch channel (full list per update, non-blocking on the send side), and
//! completion reports travel over a dedicated channel carrying the worker's
//! final metrics. Per-sender FIFO per channel guarantees that a worker's
//! alerts are all enqueued before its completion report.

use crate::types::{Alert, BlockedIp, Metrics};

/// Capacity of the shared worker-to-coordinator alert channel. Generous
/// buffering keeps workers from stalling while the coordinator is busy
/// broadcasting.
pub const ALERT_CHANNEL_CAPACITY: usize = 10_000;

/// One alert on its way to the coordinator.
#[derive(Debug, Clone)]
pub struct AlertEnvelope {
    /// Peer id of the sending worker (1-based; 0 is the coordinator).
    pub worker: usize,
    pub alert: Alert,
}

/// Completion handshake: the worker has exhausted its partition and reports
/// its final metrics.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub metrics: Metrics,
}

/// Payload of one blocklist broadcast: the coordinator's full list.
pub type BlocklistUpdate = Vec<BlockedIp>;
