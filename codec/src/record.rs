//! Structured records read from a [Reader] and written to a [Writer].

use crate::{Config, Error, Input, Reader, Writer};
use bytes::{BufMut, BytesMut};

/// A type with a fixed schema that knows which protocol calls encode and decode it.
///
/// Implementations issue a sequence of calls against a session (typically
/// `read_struct_begin`, a loop of `read_field_begin` dispatching on the field id, and
/// `read_struct_end`) and never touch the wire directly.
pub trait Record: Sized {
    /// Reads a value from the session, consuming exactly the bytes of its encoding.
    fn read<I: Input>(reader: &mut Reader<I>) -> Result<Self, Error>;

    /// Writes this value to the session.
    fn write<B: BufMut>(&self, writer: &mut Writer<B>) -> Result<(), Error>;
}

/// Encodes a record into a new buffer.
pub fn encode<R: Record>(record: &R) -> Result<BytesMut, Error> {
    let mut writer = Writer::new(BytesMut::new());
    record.write(&mut writer)?;
    Ok(writer.into_inner())
}

/// Decodes a record from `buf` with the default [Config], ensuring `buf` is fully consumed.
pub fn decode<R: Record>(buf: &[u8]) -> Result<R, Error> {
    decode_cfg(buf, Config::default())
}

/// Decodes a record from `buf`, ensuring `buf` is fully consumed.
pub fn decode_cfg<R: Record>(buf: &[u8], cfg: Config) -> Result<R, Error> {
    let mut reader = Reader::new(buf, cfg);
    let record = R::read(&mut reader)?;

    let remaining = reader.into_inner().len();
    if remaining > 0 {
        return Err(Error::InvalidData(
            std::any::type_name::<R>().into(),
            format!("{remaining} trailing bytes"),
        ));
    }
    Ok(record)
}
