//! Coordinator for the bounded write pool.
//!
//! [`run_bounded`] hands every worker `total / num_workers` writes (the
//! remainder is not written), spawns them, and then blocks on a fan-in
//! channel until every worker has reported exactly once.

use super::worker::{Completion, worker_loop};
use crate::client::{facade::LogClient, payload::PayloadGenerator};
use lumber_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Totals for a finished bounded run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub workers: usize,
    /// Writes assigned to each worker.
    pub per_worker: usize,
    pub issued: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One entry per worker, ordered by worker id.
    pub completions: Vec<Completion>,
}

/// Runs `total` writes under `prefix` across `num_workers` workers.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if `num_workers` is zero.
/// - [`Error::Channel`] if the completion channel closes before every worker
///   has reported, or a worker reports twice.
///
/// Individual write failures are not errors here; they are counted in the
/// report.
#[tracing::instrument(skip(client))]
pub async fn run_bounded(
    client: &LogClient,
    prefix: &str,
    total: usize,
    num_workers: usize,
) -> Result<PoolReport> {
    if num_workers == 0 {
        return Err(Error::InvalidArgument {
            reason: "worker count must be greater than 0".to_owned(),
        });
    }

    let per_worker = total / num_workers;
    let remainder = total % num_workers;
    if remainder > 0 {
        tracing::debug!(remainder, "count not divisible by worker count; remainder is not written");
    }

    let prefix: Arc<str> = Arc::from(prefix);
    let (done_tx, mut done_rx) = mpsc::channel(num_workers);

    for worker_id in 0..num_workers {
        tokio::spawn(worker_loop(
            worker_id,
            client.clone(),
            Arc::clone(&prefix),
            per_worker,
            PayloadGenerator::new(),
            done_tx.clone(),
        ));
    }
    // Only the workers hold senders now, so `recv` yields `None` if every
    // worker is gone without reporting.
    drop(done_tx);

    let mut reported = vec![false; num_workers];
    let mut completions = Vec::with_capacity(num_workers);

    while completions.len() < num_workers {
        let Some(done) = done_rx.recv().await else {
            return Err(Error::Channel {
                context: format!(
                    "completion channel closed after {} of {num_workers} workers reported",
                    completions.len()
                ),
            });
        };

        match reported.get_mut(done.worker_id) {
            Some(seen) if !*seen => *seen = true,
            _ => {
                return Err(Error::Channel {
                    context: format!("unexpected completion from worker {}", done.worker_id),
                });
            }
        }

        tracing::debug!(
            worker_id = done.worker_id,
            succeeded = done.succeeded,
            failed = done.failed,
            "worker completed"
        );
        completions.push(done);
    }

    completions.sort_by_key(|c| c.worker_id);
    let succeeded = completions.iter().map(|c| c.succeeded).sum::<usize>();
    let failed = completions.iter().map(|c| c.failed).sum::<usize>();

    tracing::info!(succeeded, failed, "all {num_workers} workers completed");

    Ok(PoolReport {
        workers: num_workers,
        per_worker,
        issued: succeeded + failed,
        succeeded,
        failed,
        completions,
    })
}
