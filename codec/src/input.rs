//! The byte source a [crate::Reader] decodes from.

use crate::Error;

/// A byte-at-a-time and span-of-n-bytes read interface.
///
/// Spans are returned as [Input::Span], which may borrow from the input (a zero-copy view
/// that must be dropped before the next read) or own its bytes. Dropping a span releases
/// whatever storage backs it.
pub trait Input {
    /// A view of exactly the number of bytes requested from [Input::read_span].
    type Span<'a>: AsRef<[u8]>
    where
        Self: 'a;

    /// Reads a single byte.
    ///
    /// Fails with [Error::EndOfInput] if no more bytes are available.
    fn read_byte(&mut self) -> Result<u8, Error>;

    /// Reads exactly `len` bytes.
    ///
    /// Fails with [Error::EndOfInput] if fewer than `len` bytes are available.
    fn read_span(&mut self, len: usize) -> Result<Self::Span<'_>, Error>;
}

impl Input for &[u8] {
    type Span<'a>
        = &'a [u8]
    where
        Self: 'a;

    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        let slice = *self;
        let (&byte, rest) = slice.split_first().ok_or(Error::EndOfInput)?;
        *self = rest;
        Ok(byte)
    }

    fn read_span(&mut self, len: usize) -> Result<Self::Span<'_>, Error> {
        let slice = *self;
        if slice.len() < len {
            return Err(Error::EndOfInput);
        }
        let (span, rest) = slice.split_at(len);
        *self = rest;
        Ok(span)
    }
}

impl<I: Input + ?Sized> Input for &mut I {
    type Span<'a>
        = I::Span<'a>
    where
        Self: 'a;

    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        (**self).read_byte()
    }

    #[inline]
    fn read_span(&mut self, len: usize) -> Result<Self::Span<'_>, Error> {
        (**self).read_span(len)
    }
}
