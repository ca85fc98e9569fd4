//! Unbounded write flood under a hard wall-clock ceiling.
//!
//! Workers never finish on their own. [`run_flood`] sleeps for the ceiling,
//! aborts every worker wherever it happens to be suspended and reports what
//! each one managed. In-flight writes are abandoned, not drained. The caller
//! is expected to end the process right after via [`HardDeadline::kill_process`].

use crate::client::{facade::LogClient, payload::PayloadGenerator};
use core::time::Duration;
use lumber_core::{Error, Result};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Wall-clock ceiling after which the whole process terminates.
///
/// Unlike a cancellation token nothing observes this cooperatively; work
/// still running when it fires is simply cut off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardDeadline {
    ceiling: Duration,
}

impl HardDeadline {
    pub const fn after(ceiling: Duration) -> Self {
        Self { ceiling }
    }

    pub const fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Ends the process with status 0. Telemetry must be flushed first.
    pub fn kill_process(self) -> ! {
        std::process::exit(0)
    }
}

/// Live counters for one flood worker, written by the worker and read by the
/// coordinator.
#[derive(Debug, Default)]
struct WorkerTally {
    issued: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl WorkerTally {
    fn snapshot(&self, worker_id: usize) -> TallySnapshot {
        TallySnapshot {
            worker_id,
            issued: self.issued.load(Ordering::Acquire),
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallySnapshot {
    pub worker_id: usize,
    pub issued: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl TallySnapshot {
    /// Writes that were started but had not completed when the ceiling hit.
    pub const fn in_flight(&self) -> u64 {
        self.issued.saturating_sub(self.succeeded + self.failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodReport {
    pub ceiling: Duration,
    pub workers: Vec<TallySnapshot>,
}

impl FloodReport {
    pub fn issued(&self) -> u64 {
        self.workers.iter().map(|w| w.issued).sum()
    }

    pub fn succeeded(&self) -> u64 {
        self.workers.iter().map(|w| w.succeeded).sum()
    }

    pub fn failed(&self) -> u64 {
        self.workers.iter().map(|w| w.failed).sum()
    }

    pub fn in_flight(&self) -> u64 {
        self.workers.iter().map(TallySnapshot::in_flight).sum()
    }
}

/// Floods `prefix` with writes from `num_workers` workers until `deadline`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `num_workers` is zero. Failed writes
/// are counted, never returned.
#[tracing::instrument(skip(client, deadline), fields(ceiling = ?deadline.ceiling()))]
pub async fn run_flood(
    client: &LogClient,
    prefix: &str,
    num_workers: usize,
    deadline: HardDeadline,
) -> Result<FloodReport> {
    if num_workers == 0 {
        return Err(Error::InvalidArgument {
            reason: "worker count must be greater than 0".to_owned(),
        });
    }

    let prefix: Arc<str> = Arc::from(prefix);
    let tallies: Vec<Arc<WorkerTally>> = (0..num_workers)
        .map(|_| Arc::new(WorkerTally::default()))
        .collect();

    let mut workers = JoinSet::new();
    for (worker_id, tally) in tallies.iter().enumerate() {
        workers.spawn(flood_loop(
            worker_id,
            client.clone(),
            Arc::clone(&prefix),
            Arc::clone(tally),
            PayloadGenerator::new(),
        ));
    }

    tokio::time::sleep(deadline.ceiling()).await;
    tracing::info!("DONE");

    // Waits only for the aborts to land, so the tallies below are final.
    workers.shutdown().await;

    let report = FloodReport {
        ceiling: deadline.ceiling(),
        workers: tallies
            .iter()
            .enumerate()
            .map(|(worker_id, tally)| tally.snapshot(worker_id))
            .collect(),
    };

    tracing::info!(
        issued = report.issued(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        in_flight = report.in_flight(),
        "flood ceiling reached"
    );
    Ok(report)
}

async fn flood_loop(
    worker_id: usize,
    client: LogClient,
    prefix: Arc<str>,
    tally: Arc<WorkerTally>,
    mut generator: PayloadGenerator,
) {
    tracing::trace!(worker_id, "flood worker started");

    loop {
        tally.issued.fetch_add(1, Ordering::AcqRel);
        match client.write_entry(&prefix, generator.next_payload()).await {
            Ok(ack) => {
                tally.succeeded.fetch_add(1, Ordering::AcqRel);
                tracing::info!(worker_id, key = %ack.key, timestamp_ms = ack.timestamp_ms, "write acknowledged");
            }
            Err(err) => {
                tally.failed.fetch_add(1, Ordering::AcqRel);
                tracing::warn!(worker_id, rpc = ?err.rpc(), phase = ?err.phase(), "write failed: {err}");
            }
        }
    }
}
