//! Decode and print compact-encoded records stored in files.
//!
//! [Inspector] decodes records as dynamic [Struct]s, so no schema is required. Two layouts are
//! supported:
//! - a footer record located by the trailer at the end of a file ([Inspector::footer])
//! - a run of consecutive records (each optionally preceded by a message header) within a byte
//!   range of a file ([Inspector::dump])

use prometheus_client::{encoding::text::encode, registry::Registry};
use slipstream_codec::{Reader, Record, Struct};
use slipstream_runtime::{
    footer::{self, MAGIC_LENGTH},
    pool::BufferPool,
    read_record,
    source::FileSource,
    transport::{Config, ZeroCopy},
};
use std::{fmt::Write as _, fs::File, num::NonZeroUsize, path::Path};
use thiserror::Error;
use tracing::debug;

pub mod render;

/// Errors that can occur when inspecting a file.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Runtime(#[from] slipstream_runtime::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("range {offset}..{end} exceeds file size {size}")]
    RangeOutOfBounds { offset: u64, end: u64, size: u64 },
    #[error("failed to format output")]
    Format(#[from] std::fmt::Error),
}

/// Decodes records from files using a shared buffer pool.
pub struct Inspector {
    registry: Registry,
    pool: BufferPool,
    cfg: Config,
}

impl Inspector {
    /// Creates an inspector pulling at most `chunk_size` bytes from a file at a time.
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        let mut registry = Registry::default();
        let pool = BufferPool::new(Default::default(), &mut registry);
        let cfg = Config {
            chunk_size,
            ..Default::default()
        };
        Self {
            registry,
            pool,
            cfg,
        }
    }

    /// Renders the footer record of the file at `path`.
    pub fn footer(&self, path: &Path, magic: [u8; MAGIC_LENGTH]) -> Result<String, Error> {
        let location = footer::locate(path, magic, &self.pool, &self.cfg)?;
        let record: Struct = footer::read_at(path, location, &self.pool, &self.cfg)?;

        let mut out = String::new();
        writeln!(
            out,
            "footer @ {} ({} bytes)",
            location.offset, location.length
        )?;
        writeln!(out, "{}", render::Record(&record))?;
        Ok(out)
    }

    /// Renders every record in `length` bytes of the file at `path` starting at `offset`.
    ///
    /// When `length` is `None`, the range extends to the end of the file. When `message` is set,
    /// each record is expected to follow a message header.
    pub fn dump(
        &self,
        path: &Path,
        offset: u64,
        length: Option<u64>,
        message: bool,
    ) -> Result<String, Error> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let length = length.unwrap_or_else(|| size.saturating_sub(offset));
        let end = offset.saturating_add(length);
        if end > size {
            return Err(Error::RangeOutOfBounds { offset, end, size });
        }

        let mut source = FileSource::new(file, offset, length);
        let mut out = String::new();
        let mut index = 0;
        while source.remaining() > 0 {
            writeln!(out, "record {index} @ {}", source.position())?;
            if message {
                let transport = ZeroCopy::new(&mut source, self.pool.clone(), &self.cfg);
                let mut reader = Reader::new(transport, self.cfg.limits);
                let header = reader.read_message_begin().map_err(|source| {
                    slipstream_runtime::Error::Decode {
                        record: "message header",
                        source,
                    }
                })?;
                let record =
                    Struct::read(&mut reader).map_err(|source| slipstream_runtime::Error::Decode {
                        record: "message body",
                        source,
                    })?;
                reader.read_message_end();
                writeln!(out, "{}", render::Message(&header))?;
                writeln!(out, "{}", render::Record(&record))?;
            } else {
                let record: Struct = read_record(&mut source, &self.pool, &self.cfg)?;
                writeln!(out, "{}", render::Record(&record))?;
            }
            index += 1;
        }
        debug!(records = index, offset, length, "dumped range");
        Ok(out)
    }

    /// Returns the buffer pool metrics in the Prometheus text format.
    pub fn metrics(&self) -> Result<String, Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}
