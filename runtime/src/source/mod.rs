//! Chunked byte sources consumed by the [crate::transport::ZeroCopy] transport.

use crate::pool::{BufferPool, PooledBuf};
use std::io;

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

/// Options applied to every chunk read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    /// Skip integrity verification of the underlying medium, if it has any.
    pub skip_checksums: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            skip_checksums: true,
        }
    }
}

/// A stream of bytes delivered in pooled chunks.
pub trait Source {
    /// Reads the next chunk of at most `max` bytes into a buffer from `pool`.
    ///
    /// Returns `None` at the end of the stream.
    fn read_chunk(
        &mut self,
        pool: &BufferPool,
        max: usize,
        options: ReadOptions,
    ) -> io::Result<Option<PooledBuf>>;

    /// Hands back a chunk returned by [Source::read_chunk].
    ///
    /// Unread bytes left in the chunk are returned to the stream, so the next chunk starts
    /// with them.
    fn release_chunk(&mut self, chunk: PooledBuf);
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read_chunk(
        &mut self,
        pool: &BufferPool,
        max: usize,
        options: ReadOptions,
    ) -> io::Result<Option<PooledBuf>> {
        (**self).read_chunk(pool, max, options)
    }

    fn release_chunk(&mut self, chunk: PooledBuf) {
        (**self).release_chunk(chunk)
    }
}
