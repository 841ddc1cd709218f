use thiserror::Error;

use crate::{MAX_DATAGRAM_LEN, MAX_STRING_LEN};

#[derive(Error, Debug)]
pub enum Error {
    #[error("buffer too small: {0} bytes needed, {1} bytes available")]
    BufferTooSmall(usize, usize),

    #[error("string length {0} exceeds the {max}-byte limit", max = MAX_STRING_LEN)]
    StringTooLong(usize),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid value kind tag: {0:#010x}")]
    InvalidValueKind(u32),

    #[error("encoded message is {0} bytes, over the {max}-byte datagram limit", max = MAX_DATAGRAM_LEN)]
    MessageTooLarge(usize),

    #[error("refusing to emit the legacy layout (index {0})")]
    LegacyEncode(u32),

    #[error("the text protocol is not supported")]
    TextUnsupported,

    #[error("unknown protocol tag: {0}")]
    UnknownProtocol(String),
}
