use crate::client::{payload::PayloadGenerator, telemetry::record_call_error};
use lumber_core::{Error, Rpc, proto::WriteEntryRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What the send flow managed before it stopped.
#[derive(Debug)]
pub struct SendOutcome {
    /// Messages accepted by the outbound channel.
    pub sent: usize,
    /// Set when the send half was torn down before `count` messages went out.
    pub error: Option<Error>,
}

/// Pushes `count` freshly generated entries for `prefix` into `outbound`.
///
/// Stops early when `session` is cancelled. A failed send means the
/// transport already dropped the request body; the flow records it and stops
/// without touching `session`, so the receive side still drains whatever the
/// service sent and observes the stream's own terminal status.
/// Dropping `outbound` on return closes the send half of the stream.
pub async fn send_flow(
    outbound: mpsc::Sender<WriteEntryRequest>,
    prefix: Arc<str>,
    count: usize,
    mut generator: PayloadGenerator,
    session: CancellationToken,
) -> SendOutcome {
    let rpc = Rpc::WriteEntryStream;
    let mut sent = 0;
    let mut error = None;

    while sent < count {
        let request = WriteEntryRequest {
            prefix: prefix.to_string(),
            data: generator.next_payload(),
        };

        tokio::select! {
            biased;

            () = session.cancelled() => {
                tracing::debug!(%rpc, sent, "send flow cancelled");
                break;
            }
            res = outbound.send(request) => {
                if res.is_err() {
                    let err = Error::send_half_closed(rpc);
                    record_call_error(&err);
                    tracing::warn!(%rpc, sent, "send failed: {err}");
                    error = Some(err);
                    break;
                }
                sent += 1;
            }
        }
    }

    drop(outbound);
    tracing::debug!(%rpc, sent, "send half closed");
    SendOutcome { sent, error }
}
