// The protocol crate uses only safe Rust.
#![forbid(unsafe_code)]

pub mod cursor;
pub mod error;
pub mod message;
pub mod value;
pub mod wire;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub use error::Error;
// Re-export commonly used types
pub use message::MetricMessage;
pub use value::{MetricValue, ValueKind};
pub use wire::{FromWire, ToWire};

/// Largest UDP payload an agent will emit or accept: a 1500-byte
/// ethernet MTU minus 28 bytes of IP and UDP headers.
pub const MAX_DATAGRAM_LEN: usize = 1472;

/// Message indexes below this value select the legacy message layout;
/// the current layout starts here. The legacy layout is decoded for
/// interoperability with old agents but never emitted.
pub const CURRENT_INDEX: u32 = 1024;

/// Longest hostname, metric name, units, or string value accepted on
/// the wire.
pub const MAX_STRING_LEN: usize = 1024;

/// Framing a channel is tagged with. Every channel carries exactly one
/// and the codec is selected by it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Protocol {
    /// XDR-style binary framing: big-endian, 4-byte aligned.
    Xdr,
    /// Whitespace-delimited text lines. Recognized but not implemented;
    /// all codec operations on this tag fail.
    Text,
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xdr" => Ok(Protocol::Xdr),
            "text" => Ok(Protocol::Text),
            _ => Err(Error::UnknownProtocol(s.to_string())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Xdr => f.write_str("xdr"),
            Protocol::Text => f.write_str("text"),
        }
    }
}
