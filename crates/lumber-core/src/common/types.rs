//! # RPC and phase identifiers
//!
//! Every failure, log line and metric produced by the driver is tagged with
//! the RPC it belongs to and the phase of that RPC in which it happened. Both
//! are small `Copy` enums so they can be threaded through hot loops freely.

use core::fmt;

/// The `lumber.LogStore` methods the driver can invoke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rpc {
    WriteEntry,
    WriteEntryStream,
    ReadEntry,
    ReadEntries,
    ReadEntriesStream,
    TailEntriesStream,
    ListPrefixes,
    ListKeys,
}

impl Rpc {
    /// The method name as it appears in the service definition.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WriteEntry => "WriteEntry",
            Self::WriteEntryStream => "WriteEntryStream",
            Self::ReadEntry => "ReadEntry",
            Self::ReadEntries => "ReadEntries",
            Self::ReadEntriesStream => "ReadEntriesStream",
            Self::TailEntriesStream => "TailEntriesStream",
            Self::ListPrefixes => "ListPrefixes",
            Self::ListKeys => "ListKeys",
        }
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in an RPC's lifecycle something happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Issuing the call or opening the stream.
    Call,
    /// Pushing a message onto the send half of a stream.
    Send,
    /// Pulling a message off the receive half of a stream.
    Recv,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Send => "send",
            Self::Recv => "recv",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
