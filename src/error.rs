//! Error types for wirecall.

use thiserror::Error;

/// Main error type for all wirecall operations.
#[derive(Debug, Error)]
pub enum WirecallError {
    /// I/O error reported by the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (unknown command byte, version mismatch, truncated envelope).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No handler registered on the peer for the named method.
    #[error("No method registered under name: {0}")]
    MethodNotFound(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A pending asynchronous call aged out without receiving a response.
    #[error("Pending call expired without a response")]
    CallExpired,
}

/// Result type alias using WirecallError.
pub type Result<T> = std::result::Result<T, WirecallError>;

/// Outcome of a call attempt, as seen by the caller of `invoke`,
/// `invoke_async`, or `notify`.
///
/// Success is the `Ok` arm of [`CallResult`]; these two variants cover the
/// failure half of the tri-state. Dispatch failures on the peer (registry
/// miss, payload type mismatch) are never surfaced here directly -- a sync
/// call whose name has no handler simply gets no reply, which the transport
/// reports as a send/receive failure.
#[derive(Debug, Error)]
pub enum CallError {
    /// No live connection; the call was not attempted.
    #[error("no live connection")]
    Disconnected,

    /// The transport accepted the call but sending or receiving failed.
    #[error("transport send or receive failed")]
    Comm(#[source] WirecallError),
}

impl CallError {
    /// True when the call failed because no connection was available.
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, CallError::Disconnected)
    }

    /// True when the call failed at the transport.
    #[inline]
    pub fn is_comm(&self) -> bool {
        matches!(self, CallError::Comm(_))
    }
}

/// Result type alias for caller-facing call operations.
pub type CallResult<T> = std::result::Result<T, CallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_predicates() {
        assert!(CallError::Disconnected.is_disconnected());
        assert!(!CallError::Disconnected.is_comm());

        let comm = CallError::Comm(WirecallError::ConnectionClosed);
        assert!(comm.is_comm());
        assert!(!comm.is_disconnected());
    }

    #[test]
    fn test_comm_error_preserves_source() {
        use std::error::Error as _;

        let comm = CallError::Comm(WirecallError::MethodNotFound("echo".to_string()));
        let source = comm.source().expect("comm carries a source");
        assert!(source.to_string().contains("echo"));
    }
}
