//! Variable-length integer encoding and decoding
//!
//! Each byte uses:
//! - 7 bits for the value (least significant group first)
//! - 1 "continuation" bit to indicate if more bytes follow
//!
//! Signed integers are mapped to unsigned integers with ZigZag encoding before being written,
//! so that values close to zero (positive or negative) stay short on the wire. The compact
//! protocol only ever writes 32-bit (1-5 bytes) and 64-bit (1-10 bytes) varints.

use crate::{Error, Input};
use bytes::BufMut;
use std::ops::{BitOrAssign, Shl, ShrAssign};

const BITS_PER_BYTE: usize = 8;
const DATA_BITS_PER_BYTE: usize = 7;
const DATA_BITS_MASK: u8 = 0x7F;
const CONTINUATION_BIT_MASK: u8 = 0x80;

/// A trait for unsigned integers that can be varint encoded.
pub trait UInt:
    Copy
    + From<u8>
    + Sized
    + ShrAssign<usize>
    + Shl<usize, Output = Self>
    + BitOrAssign<Self>
    + PartialOrd
{
    /// Returns the least significant byte of the integer.
    fn as_u8(self) -> u8;
}

macro_rules! impl_uint {
    ($type:ty) => {
        impl UInt for $type {
            #[inline]
            fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}
impl_uint!(u32);
impl_uint!(u64);

/// A trait for signed integers that can be converted to and from unsigned integers of the
/// equivalent size.
///
/// The conversion is ZigZag encoding: `(n << 1) ^ (n >> (bits - 1))`, which moves the sign bit
/// to the least significant bit.
pub trait SInt<UEq: UInt> {
    /// Converts the signed integer to an unsigned integer using ZigZag encoding.
    fn as_zigzag(&self) -> UEq;

    /// Converts a (ZigZag'ed) unsigned integer back to a signed integer.
    fn un_zigzag(value: UEq) -> Self;
}

macro_rules! impl_sint {
    ($type:ty, $utype:ty) => {
        impl SInt<$utype> for $type {
            #[inline]
            fn as_zigzag(&self) -> $utype {
                let shr = std::mem::size_of::<$utype>() * 8 - 1;
                ((self << 1) ^ (self >> shr)) as $utype
            }

            #[inline]
            fn un_zigzag(value: $utype) -> Self {
                ((value >> 1) as $type) ^ (-((value & 1) as $type))
            }
        }
    };
}
impl_sint!(i32, u32);
impl_sint!(i64, u64);

/// Encodes an unsigned integer as a varint.
pub fn write<T: UInt>(value: T, buf: &mut impl BufMut) {
    let continuation_threshold = T::from(CONTINUATION_BIT_MASK);
    if value < continuation_threshold {
        // Fast path for small values (lengths, sizes, and most field ids).
        buf.put_u8(value.as_u8());
        return;
    }

    let mut val = value;
    while val >= continuation_threshold {
        buf.put_u8(val.as_u8() | CONTINUATION_BIT_MASK);
        val >>= DATA_BITS_PER_BYTE;
    }
    buf.put_u8(val.as_u8());
}

/// Decodes an unsigned integer from a varint, pulling one byte at a time from `input`.
///
/// Fails with [Error::InvalidVarint] if the encoding carries bits beyond the width of `T`.
pub fn read<T: UInt>(input: &mut impl Input) -> Result<T, Error> {
    let max_bits = std::mem::size_of::<T>() * BITS_PER_BYTE;
    let mut result: T = T::from(0);
    let mut shift = 0;

    loop {
        let byte = input.read_byte()?;

        // If this must be the last byte, check for overflow (i.e. set bits beyond the size of T).
        // Because the continuation bit is the most-significant bit, this check also rejects a
        // continuation bit on the final byte.
        let remaining_bits = max_bits - shift;
        if remaining_bits <= DATA_BITS_PER_BYTE {
            let relevant_bits = BITS_PER_BYTE - byte.leading_zeros() as usize;
            if relevant_bits > remaining_bits {
                return Err(Error::InvalidVarint);
            }
        }

        result |= T::from(byte & DATA_BITS_MASK) << shift;
        if byte & CONTINUATION_BIT_MASK == 0 {
            return Ok(result);
        }
        shift += DATA_BITS_PER_BYTE;
    }
}

/// Encodes a signed integer as a varint using ZigZag encoding.
pub fn write_signed<U: UInt, S: SInt<U>>(value: S, buf: &mut impl BufMut) {
    write(value.as_zigzag(), buf);
}

/// Decodes a signed integer from a ZigZag varint.
pub fn read_signed<U: UInt, S: SInt<U>>(input: &mut impl Input) -> Result<S, Error> {
    Ok(S::un_zigzag(read(input)?))
}
