//! Duplex pump over `WriteEntryStream`.
//!
//! The send flow runs on its own task and feeds the request stream through a
//! bounded channel; the receive flow runs on the caller's task and drains
//! acknowledgements. Both watch one session token, a child of the caller's
//! token. Only the caller (Ctrl+C) and the final teardown cancel it: a send
//! half torn down by the transport just ends the send flow, and the receive
//! flow still drains every reply up to the stream's own terminal status.

use super::{
    receiver::{ReceiveOutcome, receive_flow},
    sender::{SendOutcome, send_flow},
};
use crate::client::{facade::LogClient, payload::PayloadGenerator};
use lumber_core::{Error, Result, Rpc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Result of one pump session.
#[derive(Debug)]
pub struct PumpReport {
    /// Requests handed to the send half.
    pub sent: usize,
    pub send_error: Option<Error>,
    pub outcome: ReceiveOutcome,
}

impl PumpReport {
    /// A receive failure wins over a send failure; end-of-data and
    /// cancellation both count as success.
    pub fn into_result(self) -> Result<Self> {
        if let ReceiveOutcome::Failed { error, .. } = &self.outcome {
            return Err(error.clone());
        }
        if let Some(error) = &self.send_error {
            return Err(error.clone());
        }
        Ok(self)
    }
}

/// Streams `count` generated entries under `prefix` and collects the acks.
///
/// # Errors
///
/// - The stream could not be opened.
/// - [`Error::Channel`] if the send task panicked or was aborted.
///
/// Failures after the stream is open are reported in the [`PumpReport`].
#[tracing::instrument(skip(client, cancel))]
pub async fn run_pump(
    client: &LogClient,
    prefix: &str,
    count: usize,
    buffer: usize,
    cancel: &CancellationToken,
) -> Result<PumpReport> {
    let rpc = Rpc::WriteEntryStream;
    let session = cancel.child_token();
    let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));

    let sender = tokio::spawn(send_flow(
        outbound_tx,
        Arc::from(prefix),
        count,
        PayloadGenerator::new(),
        session.clone(),
    ));

    let opened = tokio::select! {
        biased;
        () = session.cancelled() => None,
        opened = client.open_write_stream(ReceiverStream::new(outbound_rx)) => Some(opened),
    };

    let mut inbound = match opened {
        Some(Ok(inbound)) => inbound,
        Some(Err(err)) => {
            session.cancel();
            join_sender(sender).await?;
            return Err(err);
        }
        None => {
            let SendOutcome { sent, error } = join_sender(sender).await?;
            return Ok(PumpReport {
                sent,
                send_error: error,
                outcome: ReceiveOutcome::Cancelled { replies: 0 },
            });
        }
    };

    let outcome = receive_flow(rpc, &mut inbound, &session, |ack| {
        tracing::info!(key = %ack.key, timestamp_ms = ack.timestamp_ms, "stream write acknowledged");
    })
    .await;

    session.cancel();
    drop(inbound);

    let SendOutcome { sent, error } = join_sender(sender).await?;
    tracing::debug!(sent, replies = outcome.replies(), "pump session closed");

    Ok(PumpReport {
        sent,
        send_error: error,
        outcome,
    })
}

async fn join_sender(sender: tokio::task::JoinHandle<SendOutcome>) -> Result<SendOutcome> {
    sender.await.map_err(|e| Error::Channel {
        context: format!("send task failed: {e}"),
    })
}
