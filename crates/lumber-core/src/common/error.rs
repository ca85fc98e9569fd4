//! Error types for the log-store driver.
//!
//! Every failure coming back from the remote service is classified into one
//! of two buckets:
//!
//! - `ServiceReported`: the service (or the gRPC deadline machinery) answered
//!   with a recognizable status code.
//! - `TransportOrUnknown`: the call failed below the gRPC layer (connection
//!   refused, reset, broken HTTP/2 stream) or the status carried no usable
//!   classification.
//!
//! Both carry the originating [`Rpc`] and [`Phase`] so a fatal error names
//! exactly which call and which step failed.
//!
//! The remaining variants cover driver-side failures: completion fan-in
//! breakdown, bad arguments and endpoint setup.

use crate::{Phase, Rpc};
use core::time::Duration;
use tonic::{Code, Status, TimeoutExpired};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the driver.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The service rejected or failed the call with a gRPC status.
    #[error("{rpc} {phase} rejected by service ({code:?}): {message}")]
    ServiceReported {
        rpc: Rpc,
        phase: Phase,
        code: Code,
        message: String,
    },

    /// Connection-level or unclassified failure.
    #[error("{rpc} {phase} failed in transport: {message}")]
    TransportOrUnknown {
        rpc: Rpc,
        phase: Phase,
        message: String,
    },

    /// Internal channel failure between driver tasks.
    #[error("Channel error: {context}")]
    Channel { context: String },

    /// A command or configuration value was unusable.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The endpoint could not be turned into a usable channel.
    #[error("Failed to set up channel to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },
}

impl Error {
    /// Classifies a failed call.
    ///
    /// A status whose source chain contains tonic's [`TimeoutExpired`] is the
    /// client-side `grpc-timeout` firing and reads as `DeadlineExceeded`.
    /// Otherwise a status is treated as transport-level when it wraps an
    /// underlying error (tonic attaches the hyper/IO cause as the source) or
    /// when its code is [`Code::Unknown`]. Anything else was reported by the
    /// service.
    pub fn classify(rpc: Rpc, phase: Phase, status: &Status) -> Self {
        let source = std::error::Error::source(status);
        if is_timeout(source) {
            return Self::ServiceReported {
                rpc,
                phase,
                code: Code::DeadlineExceeded,
                message: TimeoutExpired(()).to_string(),
            };
        }
        if source.is_none() && status.code() != Code::Unknown {
            return Self::ServiceReported {
                rpc,
                phase,
                code: status.code(),
                message: status.message().to_owned(),
            };
        }

        let message = match source {
            Some(src) if status.message().is_empty() => src.to_string(),
            Some(src) => format!("{}: {src}", status.message()),
            None => status.message().to_owned(),
        };
        Self::TransportOrUnknown {
            rpc,
            phase,
            message,
        }
    }

    /// A locally enforced deadline elapsed before the call finished.
    pub fn deadline_exceeded(rpc: Rpc, phase: Phase, deadline: Duration) -> Self {
        Self::ServiceReported {
            rpc,
            phase,
            code: Code::DeadlineExceeded,
            message: format!("deadline of {deadline:?} elapsed"),
        }
    }

    /// The send half of a stream was torn down underneath the sender.
    pub fn send_half_closed(rpc: Rpc) -> Self {
        Self::TransportOrUnknown {
            rpc,
            phase: Phase::Send,
            message: "send half closed before the message was accepted".to_owned(),
        }
    }

    pub const fn rpc(&self) -> Option<Rpc> {
        match self {
            Self::ServiceReported { rpc, .. } | Self::TransportOrUnknown { rpc, .. } => Some(*rpc),
            _ => None,
        }
    }

    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::ServiceReported { phase, .. } | Self::TransportOrUnknown { phase, .. } => {
                Some(*phase)
            }
            _ => None,
        }
    }

    /// The gRPC code, only present for service-reported failures.
    pub const fn code(&self) -> Option<Code> {
        match self {
            Self::ServiceReported { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub const fn is_service_reported(&self) -> bool {
        matches!(self, Self::ServiceReported { .. })
    }
}

fn is_timeout(mut source: Option<&(dyn std::error::Error + 'static)>) -> bool {
    while let Some(err) = source {
        if err.is::<TimeoutExpired>() {
            return true;
        }
        source = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_status_is_service_reported() {
        let status = Status::not_found("no entry under key k1");
        let err = Error::classify(Rpc::ReadEntry, Phase::Call, &status);

        assert!(err.is_service_reported());
        assert_eq!(err.code(), Some(Code::NotFound));
        assert_eq!(err.rpc(), Some(Rpc::ReadEntry));
        assert_eq!(err.phase(), Some(Phase::Call));
        assert_eq!(
            err.to_string(),
            "ReadEntry call rejected by service (NotFound): no entry under key k1"
        );
    }

    #[test]
    fn unknown_code_is_transport_or_unknown() {
        let status = Status::unknown("h2 protocol error");
        let err = Error::classify(Rpc::TailEntriesStream, Phase::Recv, &status);

        assert!(!err.is_service_reported());
        assert_eq!(err.code(), None);
        assert_eq!(err.phase(), Some(Phase::Recv));
        assert!(err.to_string().contains("TailEntriesStream recv failed in transport"));
    }

    #[test]
    fn status_with_source_is_transport_or_unknown() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let status = Status::from_error(Box::new(io));
        let err = Error::classify(Rpc::WriteEntry, Phase::Call, &status);

        assert!(matches!(err, Error::TransportOrUnknown { rpc: Rpc::WriteEntry, .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("transport error")]
    struct TransportFailure(#[source] TimeoutExpired);

    #[test]
    fn client_timeout_in_source_chain_reads_as_deadline_exceeded() {
        let mut status = Status::unknown("transport error");
        status.set_source(std::sync::Arc::new(TransportFailure(TimeoutExpired(()))));

        let err = Error::classify(Rpc::WriteEntry, Phase::Call, &status);

        assert!(err.is_service_reported());
        assert_eq!(err.code(), Some(Code::DeadlineExceeded));
        assert_eq!(err.rpc(), Some(Rpc::WriteEntry));
    }

    #[test]
    fn local_deadline_reads_as_deadline_exceeded() {
        let err = Error::deadline_exceeded(Rpc::ListKeys, Phase::Call, Duration::from_secs(10));
        assert_eq!(err.code(), Some(Code::DeadlineExceeded));
        assert_eq!(err.rpc(), Some(Rpc::ListKeys));
    }

    #[test]
    fn driver_errors_carry_no_rpc() {
        let err = Error::Channel {
            context: "completion channel closed".to_owned(),
        };
        assert_eq!(err.rpc(), None);
        assert_eq!(err.phase(), None);
    }
}
