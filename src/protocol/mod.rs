//! Wire framing: command codes, correlation tokens, envelope encoding.

mod envelope;
mod opcode;
mod token;

pub use envelope::Envelope;
pub use opcode::{OpCode, Role, PROTOCOL_VERSION};
pub use token::CallToken;
