//! Command dispatch for `lmc`.

use crate::client::{
    config::ClientConfig,
    facade::LogClient,
    flood::{HardDeadline, run_flood},
    pool::manager::run_bounded,
    streaming::{pump::run_pump, receiver::ReceiveOutcome},
};
use lumber_core::Result;
use lumber_core::proto::Entry;
use tokio_util::sync::CancellationToken;

pub const USAGE: &str = "\
Usage: lmc [OPTIONS] <COMMAND> [ARGS]...

Commands:
  write <prefix> <data>   Append one entry
  read <key>              Read one entry by key
  read-all <prefix>       Read every entry under a prefix in one call
  read-stream <prefix>    Stream every entry under a prefix
  tail <prefix>           Follow a prefix until the stream ends or Ctrl+C
  list-prefixes           List every prefix
  list-keys <prefix>      List the keys under a prefix
  write-bulk <prefix>     Write --count entries across --num-workers workers
  write-flood <prefix>    Write from --num-workers workers until the flood ceiling
  write-stream <prefix>   Write --count entries over one bidirectional stream

Run `lmc --help` for options.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write { prefix: String, data: String },
    Read { key: String },
    ReadAll { prefix: String },
    ReadStream { prefix: String },
    Tail { prefix: String },
    ListPrefixes,
    ListKeys { prefix: String },
    WriteBulk { prefix: String },
    WriteFlood { prefix: String },
    WriteStream { prefix: String },
}

impl Command {
    /// Parses the positional arguments. Unknown names and wrong arity yield
    /// `None`.
    pub fn parse(args: &[String]) -> Option<Self> {
        let (name, rest) = args.split_first()?;
        let command = match (name.as_str(), rest) {
            ("write", [prefix, data]) => Self::Write {
                prefix: prefix.clone(),
                data: data.clone(),
            },
            ("read", [key]) => Self::Read { key: key.clone() },
            ("read-all", [prefix]) => Self::ReadAll {
                prefix: prefix.clone(),
            },
            ("read-stream", [prefix]) => Self::ReadStream {
                prefix: prefix.clone(),
            },
            ("tail", [prefix]) => Self::Tail {
                prefix: prefix.clone(),
            },
            ("list-prefixes", []) => Self::ListPrefixes,
            ("list-keys", [prefix]) => Self::ListKeys {
                prefix: prefix.clone(),
            },
            ("write-bulk", [prefix]) => Self::WriteBulk {
                prefix: prefix.clone(),
            },
            ("write-flood", [prefix]) => Self::WriteFlood {
                prefix: prefix.clone(),
            },
            ("write-stream", [prefix]) => Self::WriteStream {
                prefix: prefix.clone(),
            },
            _ => return None,
        };
        Some(command)
    }

    /// Commands that observe Ctrl+C through the root cancellation token.
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Tail { .. } | Self::WriteStream { .. })
    }
}

/// How the process should end once a command returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Flush telemetry, then terminate immediately.
    HardExit(HardDeadline),
}

fn log_entry(entry: &Entry) {
    tracing::info!(key = %entry.key, data = %entry.data, timestamp_ms = entry.timestamp_ms, "entry");
}

pub async fn run(
    command: Command,
    client: &LogClient,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    match command {
        Command::Write { prefix, data } => {
            let ack = client.write_entry(&prefix, data).await?;
            tracing::info!(key = %ack.key, timestamp_ms = ack.timestamp_ms, "write acknowledged");
        }
        Command::Read { key } => log_entry(&client.read_entry(&key).await?),
        Command::ReadAll { prefix } => {
            let list = client.read_entries(&prefix).await?;
            list.entries.iter().for_each(log_entry);
            tracing::info!(entries = list.entries.len(), "read complete");
        }
        Command::ReadStream { prefix } => {
            let received = client
                .read_entries_stream(&prefix, |entry| log_entry(&entry))
                .await?;
            tracing::info!(entries = received, "stream drained");
        }
        Command::Tail { prefix } => {
            match client
                .tail_entries(&prefix, cancel, |entry| log_entry(&entry))
                .await?
            {
                ReceiveOutcome::EndOfData { replies } => {
                    tracing::info!(entries = replies, "tail ended by server");
                }
                ReceiveOutcome::Cancelled { replies } => {
                    tracing::info!(entries = replies, "tail cancelled");
                }
                ReceiveOutcome::Failed { error, .. } => return Err(error),
            }
        }
        Command::ListPrefixes => {
            for prefix in client.list_prefixes().await?.prefixes {
                tracing::info!(%prefix, "prefix");
            }
        }
        Command::ListKeys { prefix } => {
            for key in client.list_keys(&prefix).await?.keys {
                tracing::info!(%key, "key");
            }
        }
        Command::WriteBulk { prefix } => {
            let report = run_bounded(client, &prefix, config.count, config.num_workers).await?;
            tracing::info!(
                workers = report.workers,
                per_worker = report.per_worker,
                issued = report.issued,
                succeeded = report.succeeded,
                failed = report.failed,
                reported = report.completions.len(),
                "bulk write finished"
            );
        }
        Command::WriteFlood { prefix } => {
            let deadline = HardDeadline::after(config.flood_ceiling);
            let report = run_flood(client, &prefix, config.num_workers, deadline).await?;
            for worker in &report.workers {
                tracing::debug!(
                    worker_id = worker.worker_id,
                    issued = worker.issued,
                    succeeded = worker.succeeded,
                    failed = worker.failed,
                    in_flight = worker.in_flight(),
                    "flood worker tally"
                );
            }
            tracing::info!(ceiling = ?report.ceiling, "flood finished, exiting");
            return Ok(Outcome::HardExit(deadline));
        }
        Command::WriteStream { prefix } => {
            let report = run_pump(
                client,
                &prefix,
                config.count,
                config.stream_buffer_size,
                cancel,
            )
            .await?
            .into_result()?;
            tracing::info!(
                sent = report.sent,
                acked = report.outcome.replies(),
                "write stream finished"
            );
        }
    }
    Ok(Outcome::Done)
}
