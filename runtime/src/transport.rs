//! A zero-copy [Input] over a chunked [Source].
//!
//! The transport holds at most one chunk at a time. A span that lies entirely within the held
//! chunk is returned as a borrowed view of it ([Span::Borrowed]), without copying or
//! allocating. A span that straddles chunks is copied into a buffer from the pool
//! ([Span::Assembled]), releasing every exhausted chunk back to the source along the way.
//!
//! ```text
//!          chunk 1                chunk 2
//!   [ .. | span A | .. ][ .. span B .. | .. ]
//!          borrowed        ^ assembled ^
//! ```

use crate::{
    pool::{BufferPool, PooledBuf},
    source::{ReadOptions, Source},
    NZUsize,
};
use bytes::Buf;
use slipstream_codec::{Error, Input};
use std::num::NonZeroUsize;
use tracing::trace;

/// Default upper bound on the size of a chunk pulled from a source.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = NZUsize!(1 << 20);

/// Configuration for a [ZeroCopy] transport and the sessions decoding from it.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of bytes requested from the source per chunk.
    pub chunk_size: NonZeroUsize,
    /// Options passed to every chunk read.
    pub options: ReadOptions,
    /// Limits applied by sessions decoding from the transport.
    pub limits: slipstream_codec::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            options: ReadOptions::default(),
            limits: slipstream_codec::Config::default(),
        }
    }
}

/// A span of bytes returned by [ZeroCopy].
///
/// Dropping the span releases it: a borrowed span ends its borrow of the transport and an
/// assembled span returns its buffer to the pool.
#[derive(Debug)]
pub enum Span<'a> {
    /// A view into the chunk currently held by the transport.
    Borrowed(&'a [u8]),
    /// A pooled copy of bytes that spanned more than one chunk.
    Assembled(PooledBuf),
}

impl Span<'_> {
    /// Returns `true` if the span was returned without copying.
    pub fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed(_))
    }
}

impl AsRef<[u8]> for Span<'_> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Borrowed(slice) => slice,
            Self::Assembled(buf) => buf.as_ref(),
        }
    }
}

/// Reads bytes from a [Source] one chunk at a time, handing out zero-copy spans where possible.
///
/// The held chunk is released back to the source when the transport is dropped, so unread bytes
/// remain available to the next transport created over the same source.
pub struct ZeroCopy<S: Source> {
    source: S,
    pool: BufferPool,
    chunk_size: usize,
    options: ReadOptions,

    /// The chunk currently being read, if any.
    current: Option<PooledBuf>,
}

impl<S: Source> ZeroCopy<S> {
    pub fn new(source: S, pool: BufferPool, cfg: &Config) -> Self {
        Self {
            source,
            pool,
            chunk_size: cfg.chunk_size.get(),
            options: cfg.options,
            current: None,
        }
    }

    /// Returns the number of unread bytes in the held chunk.
    pub fn buffered(&self) -> usize {
        self.current.as_ref().map_or(0, PooledBuf::len)
    }

    /// Releases the held chunk and pulls the next non-empty one.
    ///
    /// An empty chunk is treated as the end of the stream.
    fn refill(&mut self) -> Result<(), Error> {
        if let Some(chunk) = self.current.take() {
            trace!(unread = chunk.len(), "releasing chunk");
            self.source.release_chunk(chunk);
        }
        match self
            .source
            .read_chunk(&self.pool, self.chunk_size, self.options)?
        {
            Some(chunk) if !chunk.is_empty() => {
                trace!(len = chunk.len(), "pulled chunk");
                self.current = Some(chunk);
                Ok(())
            }
            Some(chunk) => {
                self.source.release_chunk(chunk);
                Err(Error::EndOfInput)
            }
            None => Err(Error::EndOfInput),
        }
    }

    /// Copies `len` bytes spanning chunk boundaries into a pooled buffer.
    fn assemble(&mut self, len: usize) -> Result<PooledBuf, Error> {
        let mut assembled = self.pool.alloc(len);
        let mut chunks = 0;
        while assembled.len() < len {
            if self.buffered() == 0 {
                self.refill()?;
                chunks += 1;
            }
            let Some(current) = self.current.as_mut() else {
                return Err(Error::EndOfInput);
            };
            let wanted = (len - assembled.len())
                .min(current.len())
                .min(assembled.remaining_mut());
            if wanted == 0 {
                break;
            }
            let copied = assembled.put_slice(&current.chunk()[..wanted]);
            current.advance(copied);
        }
        if assembled.len() != len {
            return Err(Error::AssembledLength {
                expected: len,
                actual: assembled.len(),
            });
        }
        trace!(len, chunks, "assembled span");
        Ok(assembled)
    }
}

impl<S: Source> Input for ZeroCopy<S> {
    type Span<'a>
        = Span<'a>
    where
        Self: 'a;

    fn read_byte(&mut self) -> Result<u8, Error> {
        if self.buffered() == 0 {
            self.refill()?;
        }
        match self.current.as_mut() {
            Some(current) => Ok(current.get_u8()),
            None => Err(Error::EndOfInput),
        }
    }

    fn read_span(&mut self, len: usize) -> Result<Self::Span<'_>, Error> {
        if len == 0 {
            return Ok(Span::Borrowed(&[]));
        }
        if self.buffered() == 0 {
            self.refill()?;
        }
        if self.buffered() < len {
            return self.assemble(len).map(Span::Assembled);
        }
        match self.current.as_mut() {
            Some(current) => Ok(Span::Borrowed(current.consume(len))),
            None => Err(Error::EndOfInput),
        }
    }
}

impl<S: Source> Drop for ZeroCopy<S> {
    fn drop(&mut self) {
        if let Some(chunk) = self.current.take() {
            self.source.release_chunk(chunk);
        }
    }
}
