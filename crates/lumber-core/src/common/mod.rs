//! Shared contract between the driver and the remote log store.
//!
//! ## Submodules
//!
//! - [`error`] - Classified error type used by every RPC wrapper.
//! - [`types`] - RPC and phase identifiers.
//! - [`proto`] - Generated `lumber.LogStore` bindings.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Phase, Rpc};

/// gRPC service and message definitions generated from `proto/lumber.proto`.
///
/// ## Service
///
/// - `LogStore` - append, read, tail and list operations on prefixed logs.
///
/// Use `proto::log_store_client::LogStoreClient` to call the service and
/// `proto::log_store_server::LogStoreServer` to host an implementation.
pub mod proto {
    tonic::include_proto!("lumber");
}
