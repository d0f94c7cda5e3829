//! Decode compact-encoded records from chunked byte sources without copying.
//!
//! This crate connects [slipstream_codec] sessions to blocking byte sources:
//! - [pool::BufferPool] loans fixed-capacity buffers from power-of-two size classes
//! - [source::Source] delivers a stream of bytes in pooled chunks ([source::FileSource],
//!   [source::MemorySource])
//! - [transport::ZeroCopy] turns a source into a codec [Input], borrowing spans that lie within a
//!   chunk and assembling spans that straddle chunks
//! - [footer] locates and decodes the record stored at the end of a file
//!
//! # Sessions
//!
//! Every entry point ([read_i32_le], [read_record]) creates and discards its own transport and
//! decode session. Unread bytes are handed back to the source when a session ends, so
//! consecutive entry points over one source read a contiguous stream.
//!
//! # Example
//!
//! ```
//! use prometheus_client::registry::Registry;
//! use slipstream_codec::{encode, Struct, Value};
//! use slipstream_runtime::{
//!     pool::BufferPool, read_i32_le, read_record, source::MemorySource, transport, NZUsize,
//! };
//!
//! let record = Struct { fields: vec![(1, Value::I32(150))] };
//! let encoded = encode(&record).unwrap();
//! let mut framed = (encoded.len() as i32).to_le_bytes().to_vec();
//! framed.extend_from_slice(&encoded);
//!
//! let pool = BufferPool::new(Default::default(), &mut Registry::default());
//! let cfg = transport::Config::default();
//! let mut source = MemorySource::new(framed, NZUsize!(3));
//!
//! assert_eq!(read_i32_le(&mut source, &pool, &cfg).unwrap(), encoded.len() as i32);
//! let decoded: Struct = read_record(&mut source, &pool, &cfg).unwrap();
//! assert_eq!(decoded, record);
//! ```

use slipstream_codec::{Input, Reader, Record};
use source::Source;
use thiserror::Error;
use transport::{Config, ZeroCopy};

pub mod footer;
pub mod pool;
pub mod source;
pub mod transport;

/// Creates a [std::num::NonZeroUsize], panicking if the value is zero.
#[macro_export]
macro_rules! NZUsize {
    ($val:expr) => {
        match ::std::num::NonZeroUsize::new($val) {
            Some(value) => value,
            None => panic!("value must be non-zero"),
        }
    };
}

/// Errors that can occur when decoding from a source.
#[derive(Error, Debug)]
pub enum Error {
    #[error("codec error: {0}")]
    Codec(#[from] slipstream_codec::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("can not read {record}: {source}")]
    Decode {
        record: &'static str,
        source: slipstream_codec::Error,
    },
    #[error("invalid magic: expected {expected:02x?} but got {found:02x?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },
    #[error("invalid footer length: {0}")]
    InvalidFooterLength(i32),
    #[error("file too short: {0} bytes")]
    FileTooShort(u64),
}

/// Decodes a 32-bit little-endian integer from `source`.
pub fn read_i32_le<S: Source>(
    source: &mut S,
    pool: &pool::BufferPool,
    cfg: &Config,
) -> Result<i32, Error> {
    let mut transport = ZeroCopy::new(source, pool.clone(), cfg);
    let span = transport.read_span(4)?;
    let bytes = span.as_ref();
    let bytes: [u8; 4] = bytes
        .try_into()
        .map_err(|_| slipstream_codec::Error::AssembledLength {
            expected: 4,
            actual: bytes.len(),
        })?;
    Ok(i32::from_le_bytes(bytes))
}

/// Decodes one record of type `R` from `source`.
pub fn read_record<R: Record, S: Source>(
    source: &mut S,
    pool: &pool::BufferPool,
    cfg: &Config,
) -> Result<R, Error> {
    let transport = ZeroCopy::new(source, pool.clone(), cfg);
    let mut reader = Reader::new(transport, cfg.limits);
    R::read(&mut reader).map_err(|source| Error::Decode {
        record: std::any::type_name::<R>(),
        source,
    })
}
