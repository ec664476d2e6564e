//! Command-code table.
//!
//! A single physical connection carries both directions of traffic -- a
//! client's outbound Sync call and a server's outbound broadcast travel the
//! same wire. Each logical envelope kind therefore owns two disjoint command
//! bytes, one per initiating role, so the inbound dispatcher can route on
//! the command byte alone:
//!
//! ```text
//! ┌───────────────┬────────┬────────┐
//! │ Envelope      │ Client │ Server │
//! ├───────────────┼────────┼────────┤
//! │ Heartbeat     │  0x01  │  0x01  │
//! │ Close         │  0x02  │  0x02  │
//! │ Sync          │  0x10  │  0x15  │
//! │ AsyncRequest  │  0x11  │  0x16  │
//! │ AsyncResponse │  0x12  │  0x17  │
//! │ Notify        │  0x13  │  0x18  │
//! └───────────────┴────────┴────────┘
//! ```
//!
//! Heartbeat and Close are connection-lifecycle envelopes and share one code
//! for both roles.

/// Protocol version byte, written after the command byte in every envelope.
pub const PROTOCOL_VERSION: u8 = 1;

/// Which side of the connection originated an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The single outbound-connection side.
    Client,
    /// The accepting, multi-peer side.
    Server,
}

impl Role {
    /// The opposite role.
    #[inline]
    pub fn peer(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// One-byte command code, the first byte of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Liveness probe, either direction.
    Heartbeat = 0x01,
    /// Connection teardown notice, either direction.
    Close = 0x02,
    /// Client-initiated blocking request.
    ClientSync = 0x10,
    /// Client-initiated correlated request.
    ClientAsyncRequest = 0x11,
    /// Client's response to a server-initiated correlated request.
    ClientAsyncResponse = 0x12,
    /// Client-initiated fire-and-forget.
    ClientNotify = 0x13,
    /// Server-initiated blocking request.
    ServerSync = 0x15,
    /// Server-initiated correlated request.
    ServerAsyncRequest = 0x16,
    /// Server's response to a client-initiated correlated request.
    ServerAsyncResponse = 0x17,
    /// Server-initiated fire-and-forget.
    ServerNotify = 0x18,
}

impl OpCode {
    /// Decode a command byte. Returns `None` for unassigned codes.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        match byte {
            0x01 => Some(OpCode::Heartbeat),
            0x02 => Some(OpCode::Close),
            0x10 => Some(OpCode::ClientSync),
            0x11 => Some(OpCode::ClientAsyncRequest),
            0x12 => Some(OpCode::ClientAsyncResponse),
            0x13 => Some(OpCode::ClientNotify),
            0x15 => Some(OpCode::ServerSync),
            0x16 => Some(OpCode::ServerAsyncRequest),
            0x17 => Some(OpCode::ServerAsyncResponse),
            0x18 => Some(OpCode::ServerNotify),
            _ => None,
        }
    }

    /// The wire byte.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The role that initiates envelopes with this code, or `None` for the
    /// lifecycle codes shared by both roles.
    pub fn origin(self) -> Option<Role> {
        match self {
            OpCode::Heartbeat | OpCode::Close => None,
            OpCode::ClientSync
            | OpCode::ClientAsyncRequest
            | OpCode::ClientAsyncResponse
            | OpCode::ClientNotify => Some(Role::Client),
            OpCode::ServerSync
            | OpCode::ServerAsyncRequest
            | OpCode::ServerAsyncResponse
            | OpCode::ServerNotify => Some(Role::Server),
        }
    }
}
