use super::{ReadOptions, Source};
use crate::pool::{BufferPool, PooledBuf};
use bytes::Bytes;
use std::{io, num::NonZeroUsize};
use tracing::trace;

/// A [Source] serving in-memory bytes in chunks of at most a fixed size.
///
/// Small chunk sizes force spans to straddle chunk boundaries, which makes this source useful
/// for exercising the transport.
pub struct MemorySource {
    data: Bytes,
    position: usize,
    chunk_size: NonZeroUsize,
    outstanding: usize,
    reads: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>, chunk_size: NonZeroUsize) -> Self {
        Self {
            data: data.into(),
            position: 0,
            chunk_size,
            outstanding: 0,
            reads: 0,
        }
    }

    /// Returns the offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of chunks read and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Returns the number of chunks read.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Source for MemorySource {
    fn read_chunk(
        &mut self,
        pool: &BufferPool,
        max: usize,
        _: ReadOptions,
    ) -> io::Result<Option<PooledBuf>> {
        let len = (self.data.len() - self.position)
            .min(max)
            .min(self.chunk_size.get());
        if len == 0 {
            return Ok(None);
        }

        let mut chunk = pool.alloc(len);
        let copied = chunk.put_slice(&self.data[self.position..self.position + len]);
        self.position += copied;
        self.outstanding += 1;
        self.reads += 1;
        Ok(Some(chunk))
    }

    fn release_chunk(&mut self, chunk: PooledBuf) {
        self.outstanding = self.outstanding.saturating_sub(1);
        let unread = chunk.len();
        if unread > 0 {
            self.position -= unread.min(self.position);
            trace!(unread, position = self.position, "rewound memory source");
        }
    }
}
