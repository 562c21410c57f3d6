use crate::ratelimit::types::Operation;

use bytes::Bytes;
use std::net::Ipv4Addr;

/// Response payload for successful writes outside the `ip/` namespace.
pub const WRITE_ACK: &str = "OK";

/// A request after the transport has pulled it apart.
#[derive(Debug, Clone)]
pub struct KvRequest<'a> {
    pub op: Operation,
    /// Key as the client sent it, before any `ip/` rewriting.
    pub key: &'a str,
    pub body: Bytes,
    pub secret: Option<&'a str>,
    pub client_ip: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvResponse {
    /// Stored value for a read.
    Value(Bytes),
    /// Acknowledgement for a write: `OK`, or the client's address for `ip/` keys.
    Written(String),
}
