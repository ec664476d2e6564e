//! Per-call routing metadata.
//!
//! A [`MethodContext`] travels with every outbound call: the method name
//! that selects the registry entry on the peer, an optional target
//! [`Endpoint`], and an opaque retry hint forwarded to the transport.

use std::fmt;

/// Address of one peer on a multi-peer connection.
///
/// The string form is transport-defined (a socket address, a pipe path, a
/// session id); this layer only compares and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Create an endpoint from a transport-defined address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Routing metadata for one call.
///
/// `endpoint` is `None` for "whichever connection this call is bound to" on
/// a client, and "broadcast to all connected peers" on a server; `Some(ep)`
/// targets exactly one peer on a server. `try_count` is an opaque retry hint
/// the transport may honor; this layer never retries.
///
/// # Example
///
/// ```
/// use wirecall::{Endpoint, MethodContext};
///
/// let ctx = MethodContext::new("echo")
///     .with_endpoint(Endpoint::new("peer-3"))
///     .with_try_count(2);
/// assert_eq!(ctx.name(), "echo");
/// assert_eq!(ctx.try_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MethodContext {
    name: String,
    endpoint: Option<Endpoint>,
    try_count: u32,
}

impl MethodContext {
    /// Create a context for the named method, bound connection, single try.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            try_count: 1,
        }
    }

    /// Target one specific peer (server role).
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set the retry hint forwarded to the transport.
    pub fn with_try_count(mut self, try_count: u32) -> Self {
        self.try_count = try_count;
        self
    }

    /// The method name resolved against the peer's registry.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The target peer, if any.
    #[inline]
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// The retry hint.
    #[inline]
    pub fn try_count(&self) -> u32 {
        self.try_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = MethodContext::new("ping");
        assert_eq!(ctx.name(), "ping");
        assert!(ctx.endpoint().is_none());
        assert_eq!(ctx.try_count(), 1);
    }

    #[test]
    fn test_builder_chain() {
        let ctx = MethodContext::new("status")
            .with_endpoint(Endpoint::from("peer-9"))
            .with_try_count(3);

        assert_eq!(ctx.endpoint().unwrap().as_str(), "peer-9");
        assert_eq!(ctx.try_count(), 3);
    }

    #[test]
    fn test_endpoint_equality_and_display() {
        let a = Endpoint::new("addr");
        let b = Endpoint::from("addr".to_string());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "addr");
    }
}
