//! Locate and decode the record stored at the end of a file.
//!
//! # Format
//!
//! ```text
//! +----- ... -----+--------------+---------+
//! |     record    | len (i32 LE) | magic   |
//! +----- ... -----+--------------+---------+
//!                  4 bytes        4 bytes
//! ```
//!
//! `len` is the number of bytes of the compact-encoded record immediately preceding it.

use crate::{
    pool::BufferPool,
    read_i32_le, read_record,
    source::FileSource,
    transport::{Config, ZeroCopy},
    Error,
};
use slipstream_codec::{Input, Record};
use std::{fs::File, path::Path};
use tracing::debug;

/// Length of the magic bytes terminating the file.
pub const MAGIC_LENGTH: usize = 4;

/// Length of the trailer following the record (length prefix and magic).
pub const TRAILER_LENGTH: u64 = 4 + MAGIC_LENGTH as u64;

/// Position of the footer record within a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub offset: u64,
    pub length: u64,
}

/// Validates the trailer of the file at `path` and returns where its footer record lies.
pub fn locate(
    path: impl AsRef<Path>,
    magic: [u8; MAGIC_LENGTH],
    pool: &BufferPool,
    cfg: &Config,
) -> Result<Location, Error> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size < TRAILER_LENGTH {
        return Err(Error::FileTooShort(size));
    }

    let trailer_offset = size - TRAILER_LENGTH;
    let mut trailer = FileSource::new(file, trailer_offset, TRAILER_LENGTH);
    let raw_length = read_i32_le(&mut trailer, pool, cfg)?;
    let mut transport = ZeroCopy::new(&mut trailer, pool.clone(), cfg);
    let span = transport.read_span(MAGIC_LENGTH)?;
    let mut found = [0u8; MAGIC_LENGTH];
    found.copy_from_slice(span.as_ref());
    if found != magic {
        return Err(Error::InvalidMagic {
            expected: magic,
            found,
        });
    }

    let length = u64::try_from(raw_length).map_err(|_| Error::InvalidFooterLength(raw_length))?;
    if length > trailer_offset {
        return Err(Error::InvalidFooterLength(raw_length));
    }
    let location = Location {
        offset: trailer_offset - length,
        length,
    };
    debug!(offset = location.offset, length, "located footer");
    Ok(location)
}

/// Decodes the footer record of the file at `path`.
///
/// The record is decoded by a fresh session over exactly the bytes the trailer points at.
pub fn read<R: Record>(
    path: impl AsRef<Path>,
    magic: [u8; MAGIC_LENGTH],
    pool: &BufferPool,
    cfg: &Config,
) -> Result<R, Error> {
    let path = path.as_ref();
    let location = locate(path, magic, pool, cfg)?;
    read_at(path, location, pool, cfg)
}

/// Decodes the record at a [Location] previously returned by [locate].
pub fn read_at<R: Record>(
    path: impl AsRef<Path>,
    location: Location,
    pool: &BufferPool,
    cfg: &Config,
) -> Result<R, Error> {
    let file = File::open(path)?;
    let mut source = FileSource::new(file, location.offset, location.length);
    read_record(&mut source, pool, cfg)
}
