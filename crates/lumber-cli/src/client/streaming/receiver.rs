use crate::client::telemetry::{increment_stream_replies, record_call_error};
use futures::{Stream, StreamExt};
use lumber_core::{Error, Phase, Rpc};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// How a receive flow ended. Exactly one of these is produced per flow.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// The remote side finished the stream; every reply was drained.
    EndOfData { replies: usize },
    /// The session token fired before the remote side finished.
    Cancelled { replies: usize },
    /// A receive failed for any reason other than end-of-data.
    Failed { replies: usize, error: Error },
}

impl ReceiveOutcome {
    pub const fn replies(&self) -> usize {
        match self {
            Self::EndOfData { replies }
            | Self::Cancelled { replies }
            | Self::Failed { replies, .. } => *replies,
        }
    }
}

/// Drains `inbound` until end-of-data, a receive error, or cancellation.
///
/// The token is polled first on every iteration (`biased`), so a token that
/// is already cancelled never lets another receive start, and a token that
/// fires while a receive is pending wins the race immediately.
pub async fn receive_flow<S, T, F>(
    rpc: Rpc,
    inbound: &mut S,
    cancel: &CancellationToken,
    mut on_reply: F,
) -> ReceiveOutcome
where
    S: Stream<Item = Result<T, Status>> + Unpin,
    F: FnMut(T),
{
    let mut replies = 0;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!(%rpc, replies, "receive flow cancelled");
                return ReceiveOutcome::Cancelled { replies };
            }
            next = inbound.next() => match next {
                Some(Ok(reply)) => {
                    replies += 1;
                    increment_stream_replies(rpc);
                    on_reply(reply);
                }
                None => {
                    tracing::debug!(%rpc, replies, "receive flow reached end of data");
                    return ReceiveOutcome::EndOfData { replies };
                }
                Some(Err(status)) => {
                    let error = Error::classify(rpc, Phase::Recv, &status);
                    record_call_error(&error);
                    return ReceiveOutcome::Failed { replies, error };
                }
            },
        }
    }
}
