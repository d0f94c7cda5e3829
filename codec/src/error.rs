//! Error types for codec operations

use std::str::Utf8Error;
use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid protocol id: expected 0x82 but got {0:#04x}")]
    InvalidProtocolId(u8),
    #[error("invalid version: expected 1 but got {0}")]
    InvalidVersion(u8),
    #[error("unknown type code: {0}")]
    UnknownType(u8),
    #[error("invalid varint")]
    InvalidVarint,
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    #[error("length exceeded: {0} > {1}")]
    LengthExceeded(usize, usize), // found, max
    #[error("nesting depth exceeded: {0}")]
    DepthExceeded(usize),
    #[error("assembled buffer has {actual} bytes but {expected} were requested")]
    AssembledLength { expected: usize, actual: usize },
    #[error("struct end without matching struct begin")]
    StructUnderflow,
    #[error("boolean field {0} is still waiting for its value")]
    PendingBool(i16),
    #[error("invalid field type: {0:?}")]
    InvalidFieldType(crate::Type),
    #[error("invalid data in {0}: {1}")]
    InvalidData(String, String), // context, message
}
