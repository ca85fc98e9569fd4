//! In-process mock of the `lumber.LogStore` service for driver tests.
//!
//! The mock is served by a real tonic server on `127.0.0.1:0` and reached
//! over a real `Channel`, so tests exercise the same HTTP/2 paths as
//! production. Failure behavior is selected per store with [`WriteMode`]
//! (unary writes) and [`StreamMode`] (the bidirectional write stream).

use crate::client::facade::LogClient;
use core::pin::Pin;
use lumber_core::proto::{
    Entry, EntryList, KeyList, ListKeysRequest, ListPrefixesRequest, PrefixList,
    ReadEntriesRequest, ReadEntryRequest, WriteAck, WriteEntryRequest,
    log_store_server::{LogStore, LogStoreServer},
};
use portable_atomic::{AtomicUsize, Ordering};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_stream::{
    Stream,
    wrappers::{ReceiverStream, TcpListenerStream},
};
use tonic::{
    Code, Request, Response, Status, Streaming,
    transport::{Endpoint, Server},
};

type ReplyStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

#[derive(Clone, Copy, Debug, Default)]
pub enum WriteMode {
    #[default]
    Ack,
    /// Every unary write fails with this code.
    Fail(Code),
    /// Every unary write hangs forever.
    Stall,
}

#[derive(Clone, Copy, Debug, Default)]
pub enum StreamMode {
    /// Ack every message, end the stream once the client closes its half.
    #[default]
    AckAll,
    /// End the stream right after the n-th ack.
    CloseAfter(usize),
    /// Ack n messages, then fail the stream with this code.
    FailAfter(usize, Code),
    /// Read everything, never reply, keep the stream open. Batch read
    /// streams replay what is stored, then stay open like a tail.
    Silent,
}

#[derive(Clone, Default)]
pub struct MockLogStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    write_mode: WriteMode,
    stream_mode: StreamMode,
    logs: Mutex<BTreeMap<String, Vec<Entry>>>,
    writes_received: AtomicUsize,
    stream_messages_received: AtomicUsize,
}

impl MockLogStore {
    pub fn with_write_mode(write_mode: WriteMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                write_mode,
                ..Inner::default()
            }),
        }
    }

    pub fn with_stream_mode(stream_mode: StreamMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                stream_mode,
                ..Inner::default()
            }),
        }
    }

    /// Unary `WriteEntry` calls that reached the service, failed or not.
    pub fn writes_received(&self) -> usize {
        self.inner.writes_received.load(Ordering::Relaxed)
    }

    /// Messages read off the send half of `WriteEntryStream`.
    pub fn stream_messages_received(&self) -> usize {
        self.inner.stream_messages_received.load(Ordering::Relaxed)
    }

    pub fn entries(&self, prefix: &str) -> Vec<Entry> {
        self.inner
            .logs
            .lock()
            .unwrap()
            .get(prefix)
            .cloned()
            .unwrap_or_default()
    }

    fn append(&self, prefix: &str, data: String) -> WriteAck {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        let mut logs = self.inner.logs.lock().unwrap();
        let entries = logs.entry(prefix.to_owned()).or_default();
        let key = format!("{prefix}/{}", entries.len());
        entries.push(Entry {
            key: key.clone(),
            data,
            timestamp_ms,
        });
        WriteAck { key, timestamp_ms }
    }

    fn replay(&self, prefix: &str, capacity: usize) -> mpsc::Receiver<Result<Entry, Status>> {
        let entries = self.entries(prefix);
        let (tx, rx) = mpsc::channel(capacity.max(entries.len()).max(1));
        for entry in entries {
            // Capacity covers every entry, so this never fails.
            let _ = tx.try_send(Ok(entry));
        }
        rx
    }
}

#[tonic::async_trait]
impl LogStore for MockLogStore {
    type WriteEntryStreamStream = ReplyStream<WriteAck>;
    type ReadEntriesStreamStream = ReplyStream<Entry>;
    type TailEntriesStreamStream = ReplyStream<Entry>;

    async fn write_entry(
        &self,
        request: Request<WriteEntryRequest>,
    ) -> Result<Response<WriteAck>, Status> {
        self.inner.writes_received.fetch_add(1, Ordering::Relaxed);
        match self.inner.write_mode {
            WriteMode::Ack => {}
            WriteMode::Fail(code) => return Err(Status::new(code, "mock write failure")),
            WriteMode::Stall => core::future::pending::<()>().await,
        }

        let WriteEntryRequest { prefix, data } = request.into_inner();
        Ok(Response::new(self.append(&prefix, data)))
    }

    async fn write_entry_stream(
        &self,
        request: Request<Streaming<WriteEntryRequest>>,
    ) -> Result<Response<Self::WriteEntryStreamStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let mode = self.inner.stream_mode;

        tokio::spawn(async move {
            let mut acked = 0;
            while let Ok(Some(WriteEntryRequest { prefix, data })) = inbound.message().await {
                store
                    .inner
                    .stream_messages_received
                    .fetch_add(1, Ordering::Relaxed);

                match mode {
                    StreamMode::Silent => continue,
                    StreamMode::FailAfter(limit, code) if acked == limit => {
                        let _ = tx.send(Err(Status::new(code, "mock stream failure"))).await;
                        return;
                    }
                    _ => {}
                }

                if tx.send(Ok(store.append(&prefix, data))).await.is_err() {
                    return;
                }
                acked += 1;

                if matches!(mode, StreamMode::CloseAfter(limit) if acked == limit) {
                    return;
                }
            }

            if matches!(mode, StreamMode::Silent) {
                tx.closed().await;
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn read_entry(
        &self,
        request: Request<ReadEntryRequest>,
    ) -> Result<Response<Entry>, Status> {
        let key = request.into_inner().key;
        let prefix = key.rsplit_once('/').map_or("", |(prefix, _)| prefix);
        self.entries(prefix)
            .into_iter()
            .find(|entry| entry.key == key)
            .map(Response::new)
            .ok_or_else(|| Status::not_found(format!("no entry under key {key}")))
    }

    async fn read_entries(
        &self,
        request: Request<ReadEntriesRequest>,
    ) -> Result<Response<EntryList>, Status> {
        let entries = self.entries(&request.into_inner().prefix);
        Ok(Response::new(EntryList { entries }))
    }

    async fn read_entries_stream(
        &self,
        request: Request<ReadEntriesRequest>,
    ) -> Result<Response<Self::ReadEntriesStreamStream>, Status> {
        if matches!(self.inner.stream_mode, StreamMode::Silent) {
            return self.tail_entries_stream(request).await;
        }
        let rx = self.replay(&request.into_inner().prefix, 1);
        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn tail_entries_stream(
        &self,
        request: Request<ReadEntriesRequest>,
    ) -> Result<Response<Self::TailEntriesStreamStream>, Status> {
        let prefix = request.into_inner().prefix;
        let entries = self.entries(&prefix);
        let (tx, rx) = mpsc::channel(entries.len().max(1));
        tokio::spawn(async move {
            for entry in entries {
                if tx.send(Ok(entry)).await.is_err() {
                    return;
                }
            }
            // A tail never ends on its own.
            tx.closed().await;
        });
        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn list_prefixes(
        &self,
        _request: Request<ListPrefixesRequest>,
    ) -> Result<Response<PrefixList>, Status> {
        let prefixes = self.inner.logs.lock().unwrap().keys().cloned().collect();
        Ok(Response::new(PrefixList { prefixes }))
    }

    async fn list_keys(
        &self,
        request: Request<ListKeysRequest>,
    ) -> Result<Response<KeyList>, Status> {
        let keys = self
            .entries(&request.into_inner().prefix)
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        Ok(Response::new(KeyList { keys }))
    }
}

/// Serves `store` on an ephemeral local port and returns a connected client.
pub async fn spawn_mock(store: MockLogStore) -> LogClient {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener address");

    tokio::spawn(
        Server::builder()
            .add_service(LogStoreServer::new(store))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    let channel = Endpoint::from_shared(format!("http://{addr}"))
        .expect("mock endpoint")
        .connect()
        .await
        .expect("connect to mock");
    LogClient::new(channel)
}
