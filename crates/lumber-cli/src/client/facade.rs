//! Deadline-bounded facade over the generated `LogStore` client.
//!
//! Every call the driver makes goes through [`LogClient`]. It owns the
//! per-call deadline policy, classifies failures into
//! [`lumber_core::Error`] tagged with the RPC and phase, and records call
//! metrics. It never retries; retry policy, if any, belongs to the caller.
//!
//! | Call shape | Deadline |
//! |------------|----------|
//! | unary | [`Deadlines::call`] (10s) |
//! | `ReadEntriesStream` | [`Deadlines::batch_stream`] (30s), open and drain |
//! | `TailEntriesStream`, `WriteEntryStream` | none |

use crate::client::{
    streaming::receiver::{ReceiveOutcome, receive_flow},
    telemetry::{record_call, record_call_error},
};
use core::{future::Future, time::Duration};
use futures::Stream;
use lumber_core::{
    Error, Phase, Result, Rpc,
    proto::{
        Entry, EntryList, KeyList, ListKeysRequest, ListPrefixesRequest, PrefixList,
        ReadEntriesRequest, ReadEntryRequest, WriteAck, WriteEntryRequest,
        log_store_client::LogStoreClient,
    },
};
use std::time::Instant;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::{
    Request, Response, Status, Streaming,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

pub const CALL_DEADLINE: Duration = Duration::from_secs(10);
pub const BATCH_STREAM_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Applied to each unary call.
    pub call: Duration,
    /// Applied to a whole `ReadEntriesStream`, from open to the last entry.
    pub batch_stream: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            call: CALL_DEADLINE,
            batch_stream: BATCH_STREAM_DEADLINE,
        }
    }
}

/// Cheaply cloneable handle to the remote log store.
///
/// Clones share the same underlying HTTP/2 connection.
#[derive(Clone)]
pub struct LogClient {
    inner: LogStoreClient<Channel>,
    deadlines: Deadlines,
}

impl LogClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: LogStoreClient::new(channel),
            deadlines: Deadlines::default(),
        }
    }

    /// Builds a client whose connection is established on first use, so
    /// constructing it never blocks or fails on an unreachable server.
    pub fn connect_lazy(server_addr: &str) -> Result<Self> {
        let endpoint =
            Endpoint::from_shared(server_addr.to_owned()).map_err(|e| Error::Connect {
                endpoint: server_addr.to_owned(),
                message: e.to_string(),
            })?;
        Ok(Self::new(endpoint.connect_lazy()))
    }

    #[must_use]
    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, encoding: Option<CompressionEncoding>) -> Self {
        if let Some(encoding) = encoding {
            self.inner = self
                .inner
                .send_compressed(encoding)
                .accept_compressed(encoding);
        }
        self
    }

    pub async fn write_entry(&self, prefix: &str, data: String) -> Result<WriteAck> {
        let mut client = self.inner.clone();
        let message = WriteEntryRequest {
            prefix: prefix.to_owned(),
            data,
        };
        self.unary(Rpc::WriteEntry, message, move |req| async move {
            client.write_entry(req).await
        })
        .await
    }

    pub async fn read_entry(&self, key: &str) -> Result<Entry> {
        let mut client = self.inner.clone();
        let message = ReadEntryRequest {
            key: key.to_owned(),
        };
        self.unary(Rpc::ReadEntry, message, move |req| async move {
            client.read_entry(req).await
        })
        .await
    }

    pub async fn read_entries(&self, prefix: &str) -> Result<EntryList> {
        let mut client = self.inner.clone();
        let message = ReadEntriesRequest {
            prefix: prefix.to_owned(),
        };
        self.unary(Rpc::ReadEntries, message, move |req| async move {
            client.read_entries(req).await
        })
        .await
    }

    pub async fn list_prefixes(&self) -> Result<PrefixList> {
        let mut client = self.inner.clone();
        self.unary(
            Rpc::ListPrefixes,
            ListPrefixesRequest {},
            move |req| async move { client.list_prefixes(req).await },
        )
        .await
    }

    pub async fn list_keys(&self, prefix: &str) -> Result<KeyList> {
        let mut client = self.inner.clone();
        let message = ListKeysRequest {
            prefix: prefix.to_owned(),
        };
        self.unary(Rpc::ListKeys, message, move |req| async move {
            client.list_keys(req).await
        })
        .await
    }

    /// Reads every entry under `prefix` as a stream, handing each one to
    /// `on_entry`. The batch deadline bounds the whole exchange.
    ///
    /// Returns the number of entries received.
    pub async fn read_entries_stream<F>(&self, prefix: &str, mut on_entry: F) -> Result<usize>
    where
        F: FnMut(Entry),
    {
        let rpc = Rpc::ReadEntriesStream;
        let deadline = self.deadlines.batch_stream;
        let mut client = self.inner.clone();
        let mut request = Request::new(ReadEntriesRequest {
            prefix: prefix.to_owned(),
        });
        request.set_timeout(deadline);

        let start = Instant::now();
        let drain = async {
            let opened = client.read_entries_stream(request).await;
            record_call(rpc, opened.is_ok(), elapsed_ms(start));
            let mut inbound = match opened {
                Ok(response) => response.into_inner(),
                Err(_) if start.elapsed() >= deadline => {
                    let err = Error::deadline_exceeded(rpc, Phase::Call, deadline);
                    record_call_error(&err);
                    return Err(err);
                }
                Err(status) => return Err(failed(rpc, Phase::Call, &status)),
            };

            // The deadline already bounds this drain, so no token is needed.
            match receive_flow(rpc, &mut inbound, &CancellationToken::new(), &mut on_entry).await {
                ReceiveOutcome::EndOfData { replies } => Ok(replies),
                // Already counted by the receive flow.
                ReceiveOutcome::Failed { .. } if start.elapsed() >= deadline => {
                    Err(Error::deadline_exceeded(rpc, Phase::Recv, deadline))
                }
                ReceiveOutcome::Failed { error, .. } => Err(error),
                ReceiveOutcome::Cancelled { replies } => Ok(replies),
            }
        };

        timeout(deadline, drain).await.unwrap_or_else(|_| {
            let err = Error::deadline_exceeded(rpc, Phase::Recv, deadline);
            record_call_error(&err);
            Err(err)
        })
    }

    /// Follows `prefix` until the service ends the stream or `cancel` fires.
    ///
    /// Opening the stream failing is returned as an error; everything after
    /// that is reported through the [`ReceiveOutcome`].
    pub async fn tail_entries<F>(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
        on_entry: F,
    ) -> Result<ReceiveOutcome>
    where
        F: FnMut(Entry),
    {
        let rpc = Rpc::TailEntriesStream;
        let mut client = self.inner.clone();
        let request = ReadEntriesRequest {
            prefix: prefix.to_owned(),
        };

        let start = Instant::now();
        let mut inbound = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(ReceiveOutcome::Cancelled { replies: 0 }),
            opened = client.tail_entries_stream(request) => {
                record_call(rpc, opened.is_ok(), elapsed_ms(start));
                opened
                    .map_err(|status| failed(rpc, Phase::Call, &status))?
                    .into_inner()
            }
        };

        Ok(receive_flow(rpc, &mut inbound, cancel, on_entry).await)
    }

    /// Opens the bidirectional write stream fed by `outbound`.
    ///
    /// The send half closes when `outbound` ends.
    pub async fn open_write_stream<S>(&self, outbound: S) -> Result<Streaming<WriteAck>>
    where
        S: Stream<Item = WriteEntryRequest> + Send + 'static,
    {
        let rpc = Rpc::WriteEntryStream;
        let mut client = self.inner.clone();
        let start = Instant::now();
        let opened = client.write_entry_stream(outbound).await;
        record_call(rpc, opened.is_ok(), elapsed_ms(start));
        opened
            .map(Response::into_inner)
            .map_err(|status| failed(rpc, Phase::Call, &status))
    }

    async fn unary<Req, Resp, F, Fut>(&self, rpc: Rpc, message: Req, call: F) -> Result<Resp>
    where
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = core::result::Result<Response<Resp>, Status>>,
    {
        let deadline = self.deadlines.call;
        let mut request = Request::new(message);
        request.set_timeout(deadline);

        let start = Instant::now();
        let result = match timeout(deadline, call(request)).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            // tonic enforces `grpc-timeout` on the client as well and may win
            // the race against the local timer with a plain `Cancelled`.
            Ok(Err(_)) if start.elapsed() >= deadline => {
                Err(Error::deadline_exceeded(rpc, Phase::Call, deadline))
            }
            Ok(Err(status)) => Err(Error::classify(rpc, Phase::Call, &status)),
            Err(_) => Err(Error::deadline_exceeded(rpc, Phase::Call, deadline)),
        };

        record_call(rpc, result.is_ok(), elapsed_ms(start));
        if let Err(err) = &result {
            record_call_error(err);
        }
        result
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn failed(rpc: Rpc, phase: Phase, status: &Status) -> Error {
    let err = Error::classify(rpc, phase, status);
    record_call_error(&err);
    err
}
