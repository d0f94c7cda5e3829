//! Encode the compact protocol into a [BufMut].

use crate::{
    types::{
        BOOLEAN_FALSE, BOOLEAN_TRUE, KIND_MASK, KIND_SHIFT, PROTOCOL_ID, STOP, VERSION,
        VERSION_MASK,
    },
    varint, CollectionHeader, Error, FieldHeader, MapHeader, MessageHeader, Type,
};
use bytes::BufMut;

/// Largest collection size that fits in the high nibble of a list/set header.
const MAX_PACKED_SIZE: usize = 14;

/// Largest field id delta that fits in the high nibble of a field header.
const MAX_FIELD_DELTA: i32 = 15;

/// A single encode session appending to a [BufMut].
///
/// Writes are copy-based: every value is appended to the sink as it is written.
pub struct Writer<B: BufMut> {
    buf: B,

    /// Last field ids of the enclosing structs (one entry per open struct).
    parents: Vec<i16>,
    last_field_id: i16,

    /// Id of a boolean field whose header is deferred until its value is written.
    pending_bool: Option<i16>,
}

impl<B: BufMut> Writer<B> {
    /// Creates a new session appending to `buf`.
    pub fn new(buf: B) -> Self {
        Self {
            buf,
            parents: Vec::new(),
            last_field_id: 0,
            pending_bool: None,
        }
    }

    /// Returns the number of structs currently open.
    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    /// Consumes the session, returning the underlying sink.
    pub fn into_inner(self) -> B {
        self.buf
    }

    /// Writes a message header: protocol id, version and kind, sequence id, and name.
    ///
    /// Fails with [Error::InvalidData] if the kind does not fit in two bits.
    pub fn write_message_begin(&mut self, message: &MessageHeader) -> Result<(), Error> {
        if message.kind > KIND_MASK {
            return Err(Error::InvalidData(
                "message header".into(),
                format!("kind {} does not fit in 2 bits", message.kind),
            ));
        }
        self.buf.put_u8(PROTOCOL_ID);
        self.buf
            .put_u8((VERSION & VERSION_MASK) | (message.kind << KIND_SHIFT));
        varint::write(message.seq_id as u32, &mut self.buf);
        self.write_string(&message.name)
    }

    pub fn write_message_end(&mut self) {}

    /// Opens a struct. Nothing is written.
    pub fn write_struct_begin(&mut self) {
        self.parents.push(self.last_field_id);
        self.last_field_id = 0;
    }

    /// Fails if a boolean field header is still waiting for its value.
    fn check_pending_bool(&self) -> Result<(), Error> {
        match self.pending_bool {
            Some(id) => Err(Error::PendingBool(id)),
            None => Ok(()),
        }
    }

    /// Closes the innermost struct. Nothing is written.
    pub fn write_struct_end(&mut self) -> Result<(), Error> {
        self.check_pending_bool()?;
        self.last_field_id = self.parents.pop().ok_or(Error::StructUnderflow)?;
        Ok(())
    }

    /// Writes a field header.
    ///
    /// The header of a boolean field is deferred until [Writer::write_bool] supplies its value.
    pub fn write_field_begin(&mut self, field: FieldHeader) -> Result<(), Error> {
        self.check_pending_bool()?;
        match field.ty {
            Type::Stop => Err(Error::InvalidFieldType(field.ty)),
            Type::Bool => {
                self.pending_bool = Some(field.id);
                Ok(())
            }
            ty => {
                self.write_field_header(field.id, ty.compact());
                Ok(())
            }
        }
    }

    fn write_field_header(&mut self, id: i16, code: u8) {
        let delta = i32::from(id) - i32::from(self.last_field_id);
        if delta > 0 && delta <= MAX_FIELD_DELTA {
            self.buf.put_u8(((delta as u8) << 4) | code);
        } else {
            self.buf.put_u8(code);
            self.write_i16(id);
        }
        self.last_field_id = id;
    }

    pub fn write_field_end(&mut self) {}

    /// Terminates the field list of the innermost struct.
    pub fn write_field_stop(&mut self) -> Result<(), Error> {
        self.check_pending_bool()?;
        self.buf.put_u8(STOP);
        Ok(())
    }

    /// Writes a map header. An empty map omits its key and value types.
    pub fn write_map_begin(&mut self, map: &MapHeader) -> Result<(), Error> {
        self.check_pending_bool()?;
        if map.size == 0 {
            self.buf.put_u8(0);
            return Ok(());
        }
        let (Some(key), Some(value)) = (map.key, map.value) else {
            return Err(Error::InvalidData(
                "MapHeader".into(),
                "non-empty map without key and value types".into(),
            ));
        };
        varint::write(Self::size_u32(map.size)?, &mut self.buf);
        self.buf.put_u8((key.compact() << 4) | value.compact());
        Ok(())
    }

    pub fn write_map_end(&mut self) {}

    pub fn write_list_begin(&mut self, list: &CollectionHeader) -> Result<(), Error> {
        self.write_collection_begin(list)
    }

    pub fn write_list_end(&mut self) {}

    pub fn write_set_begin(&mut self, set: &CollectionHeader) -> Result<(), Error> {
        self.write_collection_begin(set)
    }

    pub fn write_set_end(&mut self) {}

    /// Lists and sets differ on the wire only by the type of their field.
    fn write_collection_begin(&mut self, header: &CollectionHeader) -> Result<(), Error> {
        self.check_pending_bool()?;
        let code = header.element.compact();
        if header.size <= MAX_PACKED_SIZE {
            self.buf.put_u8(((header.size as u8) << 4) | code);
        } else {
            self.buf.put_u8(0xF0 | code);
            varint::write(Self::size_u32(header.size)?, &mut self.buf);
        }
        Ok(())
    }

    /// Writes a boolean, completing a deferred boolean field header if there is one.
    pub fn write_bool(&mut self, value: bool) {
        let code = if value { BOOLEAN_TRUE } else { BOOLEAN_FALSE };
        match self.pending_bool.take() {
            Some(id) => self.write_field_header(id, code),
            None => self.buf.put_u8(code),
        }
    }

    pub fn write_byte(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        varint::write_signed::<u32, i32>(i32::from(value), &mut self.buf);
    }

    pub fn write_i32(&mut self, value: i32) {
        varint::write_signed::<u32, i32>(value, &mut self.buf);
    }

    pub fn write_i64(&mut self, value: i64) {
        varint::write_signed::<u64, i64>(value, &mut self.buf);
    }

    /// Writes the IEEE-754 bits of `value` as 8 little-endian bytes.
    pub fn write_double(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), Error> {
        self.write_binary(value.as_bytes())
    }

    /// Writes a length-prefixed binary value.
    pub fn write_binary(&mut self, value: &[u8]) -> Result<(), Error> {
        varint::write(Self::size_u32(value.len())?, &mut self.buf);
        self.buf.put_slice(value);
        Ok(())
    }

    fn size_u32(size: usize) -> Result<u32, Error> {
        u32::try_from(size).map_err(|_| Error::LengthExceeded(size, u32::MAX as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{types::kind, Config, Reader};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use test_case::test_case;

    fn written(f: impl FnOnce(&mut Writer<Vec<u8>>)) -> Vec<u8> {
        let mut writer = Writer::new(Vec::new());
        f(&mut writer);
        writer.into_inner()
    }

    #[test]
    fn test_message_header_bytes() {
        let bytes = written(|w| {
            w.write_message_begin(&MessageHeader {
                name: "foo".into(),
                kind: kind::REPLY,
                seq_id: 300,
            })
            .unwrap();
            w.write_message_end();
        });
        assert_eq!(bytes, [0x82, 0x41, 0xAC, 0x02, 0x03, b'f', b'o', b'o']);

        let mut reader = Reader::new(&bytes[..], Config::default());
        let header = reader.read_message_begin().unwrap();
        assert_eq!(header.kind, kind::REPLY);
        assert_eq!(header.seq_id, 300);
        assert_eq!(header.name, "foo");
    }

    #[test]
    fn test_message_kind_out_of_range() {
        let mut writer = Writer::new(Vec::new());
        let message = MessageHeader {
            name: "m".into(),
            kind: 4,
            seq_id: 0,
        };
        assert!(matches!(
            writer.write_message_begin(&message),
            Err(Error::InvalidData(..))
        ));
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_negative_seq_id_round_trip() {
        let message = MessageHeader {
            name: "m".into(),
            kind: kind::EXCEPTION,
            seq_id: -1,
        };
        let bytes = written(|w| w.write_message_begin(&message).unwrap());
        let mut reader = Reader::new(&bytes[..], Config::default());
        assert_eq!(reader.read_message_begin().unwrap(), message);
    }

    #[test]
    fn test_two_field_struct() {
        let bytes = written(|w| {
            w.write_struct_begin();
            w.write_field_begin(FieldHeader::new(1, Type::I32)).unwrap();
            w.write_i32(150);
            w.write_field_end();
            w.write_field_begin(FieldHeader::new(5, Type::Binary)).unwrap();
            w.write_string("ok").unwrap();
            w.write_field_end();
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });

        // Both ids are delta encoded (1 from 0, 4 from 1).
        assert_eq!(bytes, [0x15, 0xAC, 0x02, 0x48, 0x02, b'o', b'k', 0x00]);

        let mut reader = Reader::new(&bytes[..], Config::default());
        reader.read_struct_begin().unwrap();
        assert_eq!(
            reader.read_field_begin().unwrap(),
            Some(FieldHeader::new(1, Type::I32))
        );
        assert_eq!(reader.read_i32().unwrap(), 150);
        assert_eq!(
            reader.read_field_begin().unwrap(),
            Some(FieldHeader::new(5, Type::Binary))
        );
        assert_eq!(reader.read_string().unwrap(), "ok");
        assert_eq!(reader.read_field_begin().unwrap(), None);
        reader.read_struct_end().unwrap();
    }

    #[test]
    fn test_field_id_sequences_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let count = rng.gen_range(1..20);
            let fields: Vec<FieldHeader> = (0..count)
                .map(|_| {
                    let ty = if rng.gen_bool(0.5) { Type::I64 } else { Type::Byte };
                    FieldHeader::new(rng.gen_range(i16::MIN..=i16::MAX), ty)
                })
                .collect();

            let bytes = written(|w| {
                w.write_struct_begin();
                for field in &fields {
                    w.write_field_begin(*field).unwrap();
                    match field.ty {
                        Type::I64 => w.write_i64(i64::from(field.id)),
                        _ => w.write_byte(field.id as i8),
                    }
                }
                w.write_field_stop().unwrap();
                w.write_struct_end().unwrap();
            });

            let mut reader = Reader::new(&bytes[..], Config::default());
            reader.read_struct_begin().unwrap();
            for field in &fields {
                assert_eq!(reader.read_field_begin().unwrap(), Some(*field));
                match field.ty {
                    Type::I64 => assert_eq!(reader.read_i64().unwrap(), i64::from(field.id)),
                    _ => assert_eq!(reader.read_byte().unwrap(), field.id as i8),
                }
            }
            assert_eq!(reader.read_field_begin().unwrap(), None);
            reader.read_struct_end().unwrap();
            assert!(reader.into_inner().is_empty());
        }
    }

    #[test]
    fn test_absolute_field_ids() {
        // Decreasing id, zero delta, and delta above 15 all use the long form.
        let bytes = written(|w| {
            w.write_struct_begin();
            w.write_field_begin(FieldHeader::new(20, Type::Byte)).unwrap();
            w.write_byte(0);
            w.write_field_begin(FieldHeader::new(20, Type::Byte)).unwrap();
            w.write_byte(0);
            w.write_field_begin(FieldHeader::new(2, Type::Byte)).unwrap();
            w.write_byte(0);
        });
        assert_eq!(bytes, [0x03, 0x28, 0x00, 0x03, 0x28, 0x00, 0x03, 0x04, 0x00]);
    }

    #[test_case(true, 0x11; "true")]
    #[test_case(false, 0x12; "false")]
    fn test_bool_field_folds_value(value: bool, header: u8) {
        let bytes = written(|w| {
            w.write_struct_begin();
            w.write_field_begin(FieldHeader::new(1, Type::Bool)).unwrap();
            w.write_bool(value);
            w.write_field_end();
            w.write_field_stop().unwrap();
            w.write_struct_end().unwrap();
        });

        // Header plus stop: no payload byte for the value.
        assert_eq!(bytes, [header, 0x00]);

        let mut reader = Reader::new(&bytes[..], Config::default());
        reader.read_struct_begin().unwrap();
        assert_eq!(
            reader.read_field_begin().unwrap(),
            Some(FieldHeader::new(1, Type::Bool))
        );
        assert_eq!(reader.read_bool().unwrap(), value);
        assert_eq!(reader.read_field_begin().unwrap(), None);
    }

    #[test]
    fn test_bool_outside_field() {
        let bytes = written(|w| {
            w.write_bool(true);
            w.write_bool(false);
        });
        assert_eq!(bytes, [BOOLEAN_TRUE, BOOLEAN_FALSE]);
    }

    #[test]
    fn test_pending_bool_misuse() {
        let mut writer = Writer::new(Vec::new());
        writer.write_struct_begin();
        writer
            .write_field_begin(FieldHeader::new(3, Type::Bool))
            .unwrap();
        assert!(matches!(
            writer.write_field_begin(FieldHeader::new(4, Type::I32)),
            Err(Error::PendingBool(3))
        ));
        assert!(matches!(writer.write_field_stop(), Err(Error::PendingBool(3))));
        assert!(matches!(writer.write_struct_end(), Err(Error::PendingBool(3))));
        assert!(matches!(
            writer.write_list_begin(&CollectionHeader::new(Type::I32, 1)),
            Err(Error::PendingBool(3))
        ));
        assert!(matches!(
            writer.write_set_begin(&CollectionHeader::new(Type::I32, 1)),
            Err(Error::PendingBool(3))
        ));
        assert!(matches!(
            writer.write_map_begin(&MapHeader::new(Type::I32, Type::I32, 1)),
            Err(Error::PendingBool(3))
        ));

        // Nothing was written for the rejected calls.
        writer.write_bool(true);
        assert_eq!(writer.into_inner(), [0x31]);
    }

    #[test]
    fn test_struct_underflow() {
        let mut writer = Writer::new(Vec::new());
        assert!(matches!(writer.write_struct_end(), Err(Error::StructUnderflow)));
    }

    #[test]
    fn test_stop_field_rejected() {
        let mut writer = Writer::new(Vec::new());
        assert!(matches!(
            writer.write_field_begin(FieldHeader::new(1, Type::Stop)),
            Err(Error::InvalidFieldType(Type::Stop))
        ));
    }

    #[test_case(0, &[0x05]; "empty")]
    #[test_case(14, &[0xE5]; "largest packed")]
    #[test_case(15, &[0xF5, 0x0F]; "smallest overflow")]
    #[test_case(1000, &[0xF5, 0xE8, 0x07]; "large")]
    fn test_collection_sizes(size: usize, expected: &[u8]) {
        let header = CollectionHeader::new(Type::I32, size);
        let list = written(|w| w.write_list_begin(&header).unwrap());
        assert_eq!(list, expected);
        let set = written(|w| w.write_set_begin(&header).unwrap());
        assert_eq!(set, expected);

        let mut reader = Reader::new(&list[..], Config::default());
        assert_eq!(reader.read_list_begin().unwrap(), header);
        let mut reader = Reader::new(&set[..], Config::default());
        assert_eq!(reader.read_set_begin().unwrap(), header);
    }

    #[test]
    fn test_map_headers() {
        let header = MapHeader::new(Type::Binary, Type::Struct, 3);
        let bytes = written(|w| w.write_map_begin(&header).unwrap());
        assert_eq!(bytes, [0x03, 0x8C]);
        let mut reader = Reader::new(&bytes[..], Config::default());
        assert_eq!(reader.read_map_begin().unwrap(), header);

        // Empty maps lose their types.
        let header = MapHeader::new(Type::I64, Type::Double, 0);
        let bytes = written(|w| w.write_map_begin(&header).unwrap());
        assert_eq!(bytes, [0x00]);
        let mut reader = Reader::new(&bytes[..], Config::default());
        let decoded = reader.read_map_begin().unwrap();
        assert_eq!(decoded.size, 0);
        assert_eq!((decoded.key, decoded.value), (None, None));

        let header = MapHeader {
            key: None,
            value: None,
            size: 1,
        };
        let mut writer = Writer::new(Vec::new());
        assert!(matches!(
            writer.write_map_begin(&header),
            Err(Error::InvalidData(_, _))
        ));
    }

    #[test]
    fn test_primitives_round_trip() {
        let bytes = written(|w| {
            w.write_byte(-5);
            w.write_i16(i16::MIN);
            w.write_i32(-1);
            w.write_i64(i64::MAX);
            w.write_double(-0.25);
            w.write_binary(&[0, 1, 2]).unwrap();
            w.write_string("").unwrap();
        });
        let mut reader = Reader::new(&bytes[..], Config::default());
        assert_eq!(reader.read_byte().unwrap(), -5);
        assert_eq!(reader.read_i16().unwrap(), i16::MIN);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert_eq!(reader.read_i64().unwrap(), i64::MAX);
        assert_eq!(reader.read_double().unwrap(), -0.25);
        assert_eq!(reader.read_binary().unwrap(), &[0, 1, 2]);
        assert_eq!(reader.read_string().unwrap(), "");
        assert!(reader.into_inner().is_empty());
    }

    #[test]
    fn test_double_bytes() {
        let bytes = written(|w| w.write_double(1.0));
        assert_eq!(bytes, [0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);
    }
}
