//! Envelope encoding and decoding.
//!
//! Every envelope is written as one command byte, one protocol-version
//! byte, then the envelope's own body:
//!
//! ```text
//! ┌─────────┬─────────┬───────────────┬──────────┬─────────────┬─────────┐
//! │ Command │ Version │ Name length   │ Name     │ Token       │ Payload │
//! │ 1 byte  │ 1 byte  │ 2 bytes u16BE │ N bytes  │ 16 bytes    │ M bytes │
//! └─────────┴─────────┴───────────────┴──────────┴─────────────┴─────────┘
//! ```
//!
//! Heartbeat and Close stop after the version byte. The token field is
//! present only for AsyncRequest and AsyncResponse. All multi-byte integers
//! are Big Endian.

use bytes::{BufMut, Bytes, BytesMut};

use super::opcode::{OpCode, Role, PROTOCOL_VERSION};
use super::token::CallToken;
use crate::error::{Result, WirecallError};

/// A tagged, serializable unit of wire traffic.
///
/// This is a closed set: the opcode table is fixed, so the envelope kinds
/// are too. Payload bytes are opaque here -- serialization of the values
/// inside them belongs to [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Liveness probe. No body.
    Heartbeat,
    /// Connection teardown notice. No body.
    Close,
    /// Blocking request; the transport correlates its reply.
    Sync {
        /// Registry name on the peer.
        name: String,
        /// Serialized request (request direction) or response (reply direction).
        body: Bytes,
    },
    /// Correlated request; the reply arrives later as [`Envelope::AsyncResponse`].
    AsyncRequest {
        /// Registry name on the peer.
        name: String,
        /// Correlation token minted by the caller.
        token: CallToken,
        /// Serialized request.
        body: Bytes,
    },
    /// Correlated response, matched to its request purely by token.
    AsyncResponse {
        /// Name of the method that produced this response.
        name: String,
        /// Correlation token echoed from the request.
        token: CallToken,
        /// Serialized response.
        body: Bytes,
    },
    /// Fire-and-forget. Never produces response traffic.
    Notify {
        /// Registry name on the peer.
        name: String,
        /// Serialized info payload.
        body: Bytes,
    },
}

impl Envelope {
    /// The command byte this envelope carries when `origin` initiates it.
    pub fn opcode(&self, origin: Role) -> OpCode {
        match (self, origin) {
            (Envelope::Heartbeat, _) => OpCode::Heartbeat,
            (Envelope::Close, _) => OpCode::Close,
            (Envelope::Sync { .. }, Role::Client) => OpCode::ClientSync,
            (Envelope::Sync { .. }, Role::Server) => OpCode::ServerSync,
            (Envelope::AsyncRequest { .. }, Role::Client) => OpCode::ClientAsyncRequest,
            (Envelope::AsyncRequest { .. }, Role::Server) => OpCode::ServerAsyncRequest,
            (Envelope::AsyncResponse { .. }, Role::Client) => OpCode::ClientAsyncResponse,
            (Envelope::AsyncResponse { .. }, Role::Server) => OpCode::ServerAsyncResponse,
            (Envelope::Notify { .. }, Role::Client) => OpCode::ClientNotify,
            (Envelope::Notify { .. }, Role::Server) => OpCode::ServerNotify,
        }
    }

    /// Encode to wire bytes as initiated by `origin`.
    pub fn encode(&self, origin: Role) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.opcode(origin).as_u8());
        buf.put_u8(PROTOCOL_VERSION);

        match self {
            Envelope::Heartbeat | Envelope::Close => {}
            Envelope::Sync { name, body } | Envelope::Notify { name, body } => {
                put_name(&mut buf, name);
                buf.put_slice(body);
            }
            Envelope::AsyncRequest { name, token, body }
            | Envelope::AsyncResponse { name, token, body } => {
                put_name(&mut buf, name);
                buf.put_slice(&token.to_bytes());
                buf.put_slice(body);
            }
        }

        buf.freeze()
    }

    /// Decode wire bytes into an envelope and the role that originated it
    /// (`None` for the shared lifecycle codes).
    ///
    /// # Errors
    ///
    /// Rejects unknown command bytes, version mismatches, and truncated
    /// bodies with [`WirecallError::Protocol`].
    pub fn decode(frame: &[u8]) -> Result<(Envelope, Option<Role>)> {
        if frame.len() < 2 {
            return Err(WirecallError::Protocol(
                "envelope shorter than command and version bytes".to_string(),
            ));
        }

        let opcode = OpCode::from_u8(frame[0]).ok_or_else(|| {
            WirecallError::Protocol(format!("unknown command byte 0x{:02X}", frame[0]))
        })?;

        if frame[1] != PROTOCOL_VERSION {
            return Err(WirecallError::Protocol(format!(
                "protocol version {} not supported (expected {})",
                frame[1], PROTOCOL_VERSION
            )));
        }

        let origin = opcode.origin();
        let rest = &frame[2..];

        let envelope = match opcode {
            OpCode::Heartbeat => Envelope::Heartbeat,
            OpCode::Close => Envelope::Close,
            OpCode::ClientSync | OpCode::ServerSync => {
                let (name, body) = take_name(rest)?;
                Envelope::Sync {
                    name,
                    body: Bytes::copy_from_slice(body),
                }
            }
            OpCode::ClientNotify | OpCode::ServerNotify => {
                let (name, body) = take_name(rest)?;
                Envelope::Notify {
                    name,
                    body: Bytes::copy_from_slice(body),
                }
            }
            OpCode::ClientAsyncRequest | OpCode::ServerAsyncRequest => {
                let (name, rest) = take_name(rest)?;
                let (token, body) = take_token(rest)?;
                Envelope::AsyncRequest {
                    name,
                    token,
                    body: Bytes::copy_from_slice(body),
                }
            }
            OpCode::ClientAsyncResponse | OpCode::ServerAsyncResponse => {
                let (name, rest) = take_name(rest)?;
                let (token, body) = take_token(rest)?;
                Envelope::AsyncResponse {
                    name,
                    token,
                    body: Bytes::copy_from_slice(body),
                }
            }
        };

        Ok((envelope, origin))
    }

    /// The method name carried by this envelope, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Envelope::Heartbeat | Envelope::Close => None,
            Envelope::Sync { name, .. }
            | Envelope::AsyncRequest { name, .. }
            | Envelope::AsyncResponse { name, .. }
            | Envelope::Notify { name, .. } => Some(name),
        }
    }

    fn encoded_len(&self) -> usize {
        2 + match self {
            Envelope::Heartbeat | Envelope::Close => 0,
            Envelope::Sync { name, body } | Envelope::Notify { name, body } => {
                2 + name.len() + body.len()
            }
            Envelope::AsyncRequest { name, body, .. }
            | Envelope::AsyncResponse { name, body, .. } => {
                2 + name.len() + CallToken::SIZE + body.len()
            }
        }
    }
}

fn put_name(buf: &mut BytesMut, name: &str) {
    debug_assert!(name.len() <= u16::MAX as usize);
    buf.put_u16(name.len() as u16);
    buf.put_slice(name.as_bytes());
}

fn take_name(buf: &[u8]) -> Result<(String, &[u8])> {
    if buf.len() < 2 {
        return Err(WirecallError::Protocol(
            "envelope truncated before name length".to_string(),
        ));
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let rest = &buf[2..];
    if rest.len() < len {
        return Err(WirecallError::Protocol(
            "envelope truncated inside name".to_string(),
        ));
    }
    let name = std::str::from_utf8(&rest[..len])
        .map_err(|_| WirecallError::Protocol("method name is not valid UTF-8".to_string()))?
        .to_string();
    Ok((name, &rest[len..]))
}

fn take_token(buf: &[u8]) -> Result<(CallToken, &[u8])> {
    if buf.len() < CallToken::SIZE {
        return Err(WirecallError::Protocol(
            "envelope truncated inside correlation token".to_string(),
        ));
    }
    let mut bytes = [0u8; CallToken::SIZE];
    bytes.copy_from_slice(&buf[..CallToken::SIZE]);
    Ok((CallToken::from_bytes(bytes), &buf[CallToken::SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(envelope: Envelope, origin: Role) -> (Envelope, Option<Role>) {
        let bytes = envelope.encode(origin);
        Envelope::decode(&bytes).unwrap()
    }

    #[test]
    fn test_lifecycle_envelopes_roundtrip() {
        for origin in [Role::Client, Role::Server] {
            let (decoded, from) = roundtrip(Envelope::Heartbeat, origin);
            assert_eq!(decoded, Envelope::Heartbeat);
            assert_eq!(from, None);

            let (decoded, from) = roundtrip(Envelope::Close, origin);
            assert_eq!(decoded, Envelope::Close);
            assert_eq!(from, None);
        }
    }

    #[test]
    fn test_sync_roundtrip_preserves_origin() {
        let envelope = Envelope::Sync {
            name: "echo".to_string(),
            body: Bytes::from_static(b"payload"),
        };

        let (decoded, from) = roundtrip(envelope.clone(), Role::Client);
        assert_eq!(decoded, envelope);
        assert_eq!(from, Some(Role::Client));

        let (decoded, from) = roundtrip(envelope.clone(), Role::Server);
        assert_eq!(decoded, envelope);
        assert_eq!(from, Some(Role::Server));
    }

    #[test]
    fn test_async_request_carries_token() {
        let token = CallToken::mint();
        let envelope = Envelope::AsyncRequest {
            name: "add".to_string(),
            token,
            body: Bytes::from_static(b"\x01\x02"),
        };

        let (decoded, from) = roundtrip(envelope, Role::Client);
        assert_eq!(from, Some(Role::Client));
        match decoded {
            Envelope::AsyncRequest {
                name,
                token: decoded_token,
                body,
            } => {
                assert_eq!(name, "add");
                assert_eq!(decoded_token, token);
                assert_eq!(&body[..], b"\x01\x02");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn test_async_response_roundtrip() {
        let token = CallToken::mint();
        let envelope = Envelope::AsyncResponse {
            name: "add".to_string(),
            token,
            body: Bytes::from_static(b"\x05"),
        };

        let (decoded, from) = roundtrip(envelope.clone(), Role::Server);
        assert_eq!(decoded, envelope);
        assert_eq!(from, Some(Role::Server));
    }

    #[test]
    fn test_notify_roundtrip_empty_body() {
        let envelope = Envelope::Notify {
            name: "ping".to_string(),
            body: Bytes::new(),
        };
        let (decoded, _) = roundtrip(envelope.clone(), Role::Client);
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_wire_layout() {
        let envelope = Envelope::Sync {
            name: "ab".to_string(),
            body: Bytes::from_static(b"xy"),
        };
        let bytes = envelope.encode(Role::Client);

        assert_eq!(bytes[0], 0x10); // ClientSync
        assert_eq!(bytes[1], PROTOCOL_VERSION);
        assert_eq!(&bytes[2..4], &[0x00, 0x02]); // name length, BE
        assert_eq!(&bytes[4..6], b"ab");
        assert_eq!(&bytes[6..], b"xy");
    }

    #[test]
    fn test_unknown_command_byte_rejected() {
        let err = Envelope::decode(&[0x7F, PROTOCOL_VERSION]).unwrap_err();
        assert!(err.to_string().contains("unknown command byte"));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let err = Envelope::decode(&[0x10, PROTOCOL_VERSION + 1, 0, 0]).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_truncated_envelopes_rejected() {
        // Too short for header.
        assert!(Envelope::decode(&[0x10]).is_err());

        // Name length says 4 but only 2 bytes follow.
        assert!(Envelope::decode(&[0x10, PROTOCOL_VERSION, 0x00, 0x04, b'a', b'b']).is_err());

        // Async request cut inside the token.
        let mut bytes = Envelope::AsyncRequest {
            name: "x".to_string(),
            token: CallToken::mint(),
            body: Bytes::new(),
        }
        .encode(Role::Client)
        .to_vec();
        bytes.truncate(bytes.len() - 8);
        assert!(Envelope::decode(&bytes).is_err());
    }

    #[test]
    fn test_name_accessor() {
        assert_eq!(Envelope::Heartbeat.name(), None);
        let envelope = Envelope::Notify {
            name: "status".to_string(),
            body: Bytes::new(),
        };
        assert_eq!(envelope.name(), Some("status"));
    }
}
