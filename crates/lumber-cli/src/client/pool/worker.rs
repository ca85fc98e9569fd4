use crate::client::{facade::LogClient, payload::PayloadGenerator};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Single-use signal that one worker has exhausted its work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub worker_id: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Issues `items` sequential writes, then reports exactly one [`Completion`].
///
/// Each write carries a fresh payload from the worker's own generator. A
/// failed write is logged and counted; it never ends the loop early.
///
/// Taking `done_tx` by value means the sender is dropped when the loop ends,
/// so a worker can never signal twice.
pub async fn worker_loop(
    worker_id: usize,
    client: LogClient,
    prefix: Arc<str>,
    items: usize,
    mut generator: PayloadGenerator,
    done_tx: mpsc::Sender<Completion>,
) {
    tracing::trace!(worker_id, items, "bulk worker started");

    let mut succeeded = 0;
    let mut failed = 0;

    for _ in 0..items {
        match client.write_entry(&prefix, generator.next_payload()).await {
            Ok(ack) => {
                succeeded += 1;
                tracing::info!(worker_id, key = %ack.key, timestamp_ms = ack.timestamp_ms, "write acknowledged");
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(worker_id, rpc = ?err.rpc(), phase = ?err.phase(), "write failed: {err}");
            }
        }
    }

    let completion = Completion {
        worker_id,
        succeeded,
        failed,
    };
    if let Err(e) = done_tx.send(completion).await {
        tracing::error!(worker_id, "failed to deliver completion: {e}");
    }

    tracing::trace!(worker_id, "bulk worker stopped");
}
