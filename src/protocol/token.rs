//! Correlation tokens.

use std::fmt;

use uuid::Uuid;

/// 128-bit unique identifier minted per outstanding asynchronous call.
///
/// A token links an AsyncRequest envelope to its eventual AsyncResponse.
/// Uniqueness must hold for the lifetime of the pending-table entry the
/// token seeds; random v4 UUIDs give that without any cross-connection
/// coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(u128);

impl CallToken {
    /// Encoded size on the wire.
    pub const SIZE: usize = 16;

    /// Mint a fresh token.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().as_u128())
    }

    /// Wire encoding (big endian).
    #[inline]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        self.0.to_be_bytes()
    }

    /// Decode from wire bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    /// The raw 128-bit value.
    #[inline]
    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for CallToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}
