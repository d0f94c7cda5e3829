//! Decode the compact protocol from an [Input].

use crate::{
    types::{BOOLEAN_TRUE, KIND_MASK, KIND_SHIFT, PROTOCOL_ID, STOP, VERSION, VERSION_MASK},
    varint, CollectionHeader, Config, Error, FieldHeader, Input, MapHeader, MessageHeader, Type,
};

/// Marker in the high nibble of a list/set header indicating that the size follows as a varint.
const SIZE_OVERFLOW: u8 = 0x0F;

/// A single decode session over an [Input].
///
/// The session tracks the id of the last field read in every open struct (so field ids can be
/// delta-decoded) and the value of a boolean field whose value was folded into its header.
/// Neither survives the session.
pub struct Reader<I: Input> {
    input: I,
    cfg: Config,

    /// Last field ids of the enclosing structs (one entry per open struct).
    parents: Vec<i16>,
    last_field_id: i16,

    /// Value of a boolean field read from its header, returned by the next [Reader::read_bool].
    pending_bool: Option<bool>,
}

impl<I: Input> Reader<I> {
    /// Creates a new session reading from `input`.
    pub fn new(input: I, cfg: Config) -> Self {
        Self {
            input,
            cfg,
            parents: Vec::new(),
            last_field_id: 0,
            pending_bool: None,
        }
    }

    /// Returns the configuration of the session.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the number of structs currently open.
    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    /// Consumes the session, returning the underlying input.
    pub fn into_inner(self) -> I {
        self.input
    }

    /// Reads a message header.
    pub fn read_message_begin(&mut self) -> Result<MessageHeader, Error> {
        let protocol_id = self.input.read_byte()?;
        if protocol_id != PROTOCOL_ID {
            return Err(Error::InvalidProtocolId(protocol_id));
        }
        let version_and_kind = self.input.read_byte()?;
        let version = version_and_kind & VERSION_MASK;
        if version != VERSION {
            return Err(Error::InvalidVersion(version));
        }
        let kind = (version_and_kind >> KIND_SHIFT) & KIND_MASK;
        let seq_id = varint::read::<u32>(&mut self.input)? as i32;
        let name = self.read_string()?;
        Ok(MessageHeader { name, kind, seq_id })
    }

    pub fn read_message_end(&mut self) {}

    /// Opens a struct. No bytes are consumed.
    pub fn read_struct_begin(&mut self) -> Result<(), Error> {
        if self.parents.len() >= self.cfg.max_depth {
            return Err(Error::DepthExceeded(self.cfg.max_depth));
        }
        self.parents.push(self.last_field_id);
        self.last_field_id = 0;
        Ok(())
    }

    /// Closes the innermost struct. No bytes are consumed.
    pub fn read_struct_end(&mut self) -> Result<(), Error> {
        self.last_field_id = self.parents.pop().ok_or(Error::StructUnderflow)?;
        Ok(())
    }

    /// Reads a field header, returning `None` at the end of the enclosing struct's fields.
    ///
    /// If the field is a boolean, its value is taken from the header and returned by the next
    /// call to [Reader::read_bool].
    pub fn read_field_begin(&mut self) -> Result<Option<FieldHeader>, Error> {
        let byte = self.input.read_byte()?;
        if byte == STOP {
            return Ok(None);
        }

        let ty = Type::from_compact(byte)?;
        if ty == Type::Stop {
            return Err(Error::InvalidFieldType(ty));
        }

        // The high nibble is either a delta from the last field id or zero (the id follows).
        let delta = (byte >> 4) as i16;
        let id = if delta == 0 {
            self.read_i16()?
        } else {
            self.last_field_id.wrapping_add(delta)
        };
        if ty == Type::Bool {
            self.pending_bool = Some(byte & 0x0F == BOOLEAN_TRUE);
        }
        self.last_field_id = id;
        Ok(Some(FieldHeader { id, ty }))
    }

    pub fn read_field_end(&mut self) {}

    /// Reads a map header.
    pub fn read_map_begin(&mut self) -> Result<MapHeader, Error> {
        let size = self.read_size()?;
        if size == 0 {
            return Ok(MapHeader {
                key: None,
                value: None,
                size,
            });
        }
        let types = self.input.read_byte()?;
        Ok(MapHeader {
            key: Some(Type::from_compact(types >> 4)?),
            value: Some(Type::from_compact(types)?),
            size,
        })
    }

    pub fn read_map_end(&mut self) {}

    /// Reads a list header.
    pub fn read_list_begin(&mut self) -> Result<CollectionHeader, Error> {
        let byte = self.input.read_byte()?;
        let element = Type::from_compact(byte)?;
        let packed = byte >> 4;
        let size = if packed == SIZE_OVERFLOW {
            self.read_size()?
        } else {
            packed as usize
        };
        Ok(CollectionHeader { element, size })
    }

    pub fn read_list_end(&mut self) {}

    /// Reads a set header (encoded exactly like a list header).
    pub fn read_set_begin(&mut self) -> Result<CollectionHeader, Error> {
        self.read_list_begin()
    }

    pub fn read_set_end(&mut self) {}

    /// Reads a boolean, either from the pending field header or from the next byte.
    pub fn read_bool(&mut self) -> Result<bool, Error> {
        if let Some(value) = self.pending_bool.take() {
            return Ok(value);
        }
        Ok(self.input.read_byte()? == BOOLEAN_TRUE)
    }

    pub fn read_byte(&mut self) -> Result<i8, Error> {
        Ok(self.input.read_byte()? as i8)
    }

    /// Reads an i16 (a zigzag varint of up to 32 bits, narrowed).
    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(self.read_i32()? as i16)
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        varint::read_signed::<u32, i32>(&mut self.input)
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        varint::read_signed::<u64, i64>(&mut self.input)
    }

    /// Reads a double stored as 8 little-endian bytes.
    pub fn read_double(&mut self) -> Result<f64, Error> {
        let span = self.input.read_span(8)?;
        let bytes = span.as_ref();
        let bits: [u8; 8] = bytes.try_into().map_err(|_| Error::AssembledLength {
            expected: 8,
            actual: bytes.len(),
        })?;
        Ok(f64::from_le_bytes(bits))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// The span holding the encoded string is released before this returns, whether or not
    /// decoding succeeds.
    pub fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_length()?;
        if len == 0 {
            return Ok(String::new());
        }
        let span = self.input.read_span(len)?;
        let decoded = std::str::from_utf8(span.as_ref()).map(str::to_owned);
        drop(span);
        Ok(decoded?)
    }

    /// Reads a length-prefixed binary value.
    ///
    /// The returned span may borrow the input's current buffer; the caller releases it by
    /// dropping it (which must happen before the next read).
    pub fn read_binary(&mut self) -> Result<I::Span<'_>, Error> {
        let len = self.read_length()?;
        self.input.read_span(len)
    }

    /// Consumes one value of type `ty` without materializing it.
    pub fn skip(&mut self, ty: Type) -> Result<(), Error> {
        self.skip_nested(ty, 0)
    }

    fn skip_nested(&mut self, ty: Type, depth: usize) -> Result<(), Error> {
        if depth > self.cfg.max_depth {
            return Err(Error::DepthExceeded(self.cfg.max_depth));
        }
        match ty {
            Type::Stop => return Err(Error::InvalidFieldType(ty)),
            Type::Bool => {
                self.read_bool()?;
            }
            Type::Byte => {
                self.read_byte()?;
            }
            Type::I16 | Type::I32 => {
                self.read_i32()?;
            }
            Type::I64 => {
                self.read_i64()?;
            }
            Type::Double => {
                self.input.read_span(8)?;
            }
            Type::Binary => {
                self.read_binary()?;
            }
            Type::Struct => {
                self.read_struct_begin()?;
                while let Some(field) = self.read_field_begin()? {
                    self.skip_nested(field.ty, depth + 1)?;
                    self.read_field_end();
                }
                self.read_struct_end()?;
            }
            Type::Map => {
                let header = self.read_map_begin()?;
                if let (Some(key), Some(value)) = (header.key, header.value) {
                    for _ in 0..header.size {
                        self.skip_nested(key, depth + 1)?;
                        self.skip_nested(value, depth + 1)?;
                    }
                }
                self.read_map_end();
            }
            Type::List | Type::Set => {
                let header = self.read_list_begin()?;
                for _ in 0..header.size {
                    self.skip_nested(header.element, depth + 1)?;
                }
                self.read_list_end();
            }
        }
        Ok(())
    }

    /// Reads a string/binary length, bounded by [Config::max_string_length].
    fn read_length(&mut self) -> Result<usize, Error> {
        let len = varint::read::<u32>(&mut self.input)? as usize;
        if len > self.cfg.max_string_length {
            return Err(Error::LengthExceeded(len, self.cfg.max_string_length));
        }
        Ok(len)
    }

    /// Reads a container size, bounded by [Config::max_container_length].
    fn read_size(&mut self) -> Result<usize, Error> {
        let size = varint::read::<u32>(&mut self.input)? as usize;
        if size > self.cfg.max_container_length {
            return Err(Error::LengthExceeded(size, self.cfg.max_container_length));
        }
        Ok(size)
    }
}
