//! A schema-less model of compact protocol values.
//!
//! [Struct] decodes any well-formed struct without knowing its schema, which makes it useful
//! for inspecting records and for testing [crate::Record] implementations.

use crate::{
    CollectionHeader, Error, FieldHeader, Input, MapHeader, Reader, Record, Type, Writer,
};
use bytes::{BufMut, Bytes};

/// A single decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    Binary(Bytes),
    List { element: Type, items: Vec<Value> },
    Set { element: Type, items: Vec<Value> },
    /// Key and value types are `None` only for an empty map read from the wire.
    Map {
        key: Option<Type>,
        value: Option<Type>,
        entries: Vec<(Value, Value)>,
    },
    Struct(Struct),
}

/// The fields of a struct, in wire order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Struct {
    pub fields: Vec<(i16, Value)>,
}

impl Struct {
    /// Returns the first field with the given id.
    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(field, value)| (*field == id).then_some(value))
    }

    fn read_nested<I: Input>(reader: &mut Reader<I>, depth: usize) -> Result<Self, Error> {
        let mut fields = Vec::new();
        reader.read_struct_begin()?;
        while let Some(field) = reader.read_field_begin()? {
            fields.push((field.id, Value::read_nested(reader, field.ty, depth + 1)?));
            reader.read_field_end();
        }
        reader.read_struct_end()?;
        Ok(Self { fields })
    }
}

impl Record for Struct {
    fn read<I: Input>(reader: &mut Reader<I>) -> Result<Self, Error> {
        Self::read_nested(reader, 0)
    }

    fn write<B: BufMut>(&self, writer: &mut Writer<B>) -> Result<(), Error> {
        writer.write_struct_begin();
        for (id, value) in &self.fields {
            writer.write_field_begin(FieldHeader::new(*id, value.ty()))?;
            value.write(writer)?;
            writer.write_field_end();
        }
        writer.write_field_stop()?;
        writer.write_struct_end()
    }
}

impl Value {
    /// Returns the logical type of the value.
    pub fn ty(&self) -> Type {
        match self {
            Self::Bool(_) => Type::Bool,
            Self::Byte(_) => Type::Byte,
            Self::I16(_) => Type::I16,
            Self::I32(_) => Type::I32,
            Self::I64(_) => Type::I64,
            Self::Double(_) => Type::Double,
            Self::Binary(_) => Type::Binary,
            Self::List { .. } => Type::List,
            Self::Set { .. } => Type::Set,
            Self::Map { .. } => Type::Map,
            Self::Struct(_) => Type::Struct,
        }
    }

    /// Reads a value of type `ty`.
    pub fn read<I: Input>(reader: &mut Reader<I>, ty: Type) -> Result<Self, Error> {
        Self::read_nested(reader, ty, 0)
    }

    fn read_nested<I: Input>(
        reader: &mut Reader<I>,
        ty: Type,
        depth: usize,
    ) -> Result<Self, Error> {
        let max_depth = reader.config().max_depth;
        if depth > max_depth {
            return Err(Error::DepthExceeded(max_depth));
        }
        let value = match ty {
            Type::Stop => return Err(Error::InvalidFieldType(ty)),
            Type::Bool => Self::Bool(reader.read_bool()?),
            Type::Byte => Self::Byte(reader.read_byte()?),
            Type::I16 => Self::I16(reader.read_i16()?),
            Type::I32 => Self::I32(reader.read_i32()?),
            Type::I64 => Self::I64(reader.read_i64()?),
            Type::Double => Self::Double(reader.read_double()?),
            Type::Binary => {
                let span = reader.read_binary()?;
                Self::Binary(Bytes::copy_from_slice(span.as_ref()))
            }
            Type::List => {
                let header = reader.read_list_begin()?;
                let items = Self::read_items(reader, header, depth)?;
                reader.read_list_end();
                Self::List {
                    element: header.element,
                    items,
                }
            }
            Type::Set => {
                let header = reader.read_set_begin()?;
                let items = Self::read_items(reader, header, depth)?;
                reader.read_set_end();
                Self::Set {
                    element: header.element,
                    items,
                }
            }
            Type::Map => {
                let header = reader.read_map_begin()?;
                let mut entries = Vec::new();
                if let (Some(key), Some(value)) = (header.key, header.value) {
                    for _ in 0..header.size {
                        let k = Self::read_nested(reader, key, depth + 1)?;
                        let v = Self::read_nested(reader, value, depth + 1)?;
                        entries.push((k, v));
                    }
                }
                reader.read_map_end();
                Self::Map {
                    key: header.key,
                    value: header.value,
                    entries,
                }
            }
            Type::Struct => Self::Struct(Struct::read_nested(reader, depth)?),
        };
        Ok(value)
    }

    fn read_items<I: Input>(
        reader: &mut Reader<I>,
        header: CollectionHeader,
        depth: usize,
    ) -> Result<Vec<Self>, Error> {
        // Sizes are bounded by the reader, but the input may still be shorter than declared.
        let mut items = Vec::with_capacity(header.size.min(1024));
        for _ in 0..header.size {
            items.push(Self::read_nested(reader, header.element, depth + 1)?);
        }
        Ok(items)
    }

    /// Writes the value (without a field header).
    pub fn write<B: BufMut>(&self, writer: &mut Writer<B>) -> Result<(), Error> {
        match self {
            Self::Bool(v) => writer.write_bool(*v),
            Self::Byte(v) => writer.write_byte(*v),
            Self::I16(v) => writer.write_i16(*v),
            Self::I32(v) => writer.write_i32(*v),
            Self::I64(v) => writer.write_i64(*v),
            Self::Double(v) => writer.write_double(*v),
            Self::Binary(v) => writer.write_binary(v)?,
            Self::List { element, items } => {
                writer.write_list_begin(&CollectionHeader::new(*element, items.len()))?;
                Self::write_items(writer, *element, items)?;
                writer.write_list_end();
            }
            Self::Set { element, items } => {
                writer.write_set_begin(&CollectionHeader::new(*element, items.len()))?;
                Self::write_items(writer, *element, items)?;
                writer.write_set_end();
            }
            Self::Map {
                key,
                value,
                entries,
            } => {
                writer.write_map_begin(&MapHeader {
                    key: *key,
                    value: *value,
                    size: entries.len(),
                })?;
                for (k, v) in entries {
                    Self::check_element(*key, k)?;
                    Self::check_element(*value, v)?;
                    k.write(writer)?;
                    v.write(writer)?;
                }
                writer.write_map_end();
            }
            Self::Struct(s) => s.write(writer)?,
        }
        Ok(())
    }

    fn write_items<B: BufMut>(
        writer: &mut Writer<B>,
        element: Type,
        items: &[Self],
    ) -> Result<(), Error> {
        for item in items {
            Self::check_element(Some(element), item)?;
            item.write(writer)?;
        }
        Ok(())
    }

    fn check_element(expected: Option<Type>, item: &Self) -> Result<(), Error> {
        if expected != Some(item.ty()) {
            return Err(Error::InvalidData(
                "Value".into(),
                format!("{:?} element in {:?} container", item.ty(), expected),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, decode_cfg, encode, Config};

    fn sample() -> Struct {
        Struct {
            fields: vec![
                (1, Value::I32(150)),
                (2, Value::Bool(false)),
                (5, Value::Binary(Bytes::from_static(b"ok"))),
                (
                    6,
                    Value::List {
                        element: Type::Bool,
                        items: vec![Value::Bool(true), Value::Bool(false)],
                    },
                ),
                (
                    30,
                    Value::Map {
                        key: Some(Type::Binary),
                        value: Some(Type::Struct),
                        entries: vec![(
                            Value::Binary(Bytes::from_static(b"inner")),
                            Value::Struct(Struct {
                                fields: vec![(-3, Value::Double(2.5)), (1, Value::Byte(-1))],
                            }),
                        )],
                    },
                ),
                (
                    31,
                    Value::Set {
                        element: Type::I64,
                        items: (0..20).map(Value::I64).collect(),
                    },
                ),
                (32, Value::I16(-300)),
            ],
        }
    }

    #[test]
    fn test_struct_round_trip() {
        let value = sample();
        let encoded = encode(&value).unwrap();
        let decoded: Struct = decode(&encoded).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.get(5), Some(&Value::Binary(Bytes::from_static(b"ok"))));
        assert_eq!(decoded.get(4), None);
    }

    #[test]
    fn test_empty_map_loses_types() {
        let value = Struct {
            fields: vec![(
                1,
                Value::Map {
                    key: Some(Type::I32),
                    value: Some(Type::I32),
                    entries: Vec::new(),
                },
            )],
        };
        let encoded = encode(&value).unwrap();
        let decoded: Struct = decode(&encoded).unwrap();
        assert_eq!(
            decoded.get(1),
            Some(&Value::Map {
                key: None,
                value: None,
                entries: Vec::new(),
            })
        );
    }

    #[test]
    fn test_mismatched_element_rejected() {
        let value = Struct {
            fields: vec![(
                1,
                Value::List {
                    element: Type::I32,
                    items: vec![Value::I64(1)],
                },
            )],
        };
        assert!(matches!(encode(&value), Err(Error::InvalidData(_, _))));
    }

    #[test]
    fn test_nested_lists_depth() {
        let mut value = Value::I32(0);
        for _ in 0..10 {
            value = Value::List {
                element: value.ty(),
                items: vec![value],
            };
        }
        let record = Struct {
            fields: vec![(1, value)],
        };
        let encoded = encode(&record).unwrap();

        let cfg = Config {
            max_depth: 4,
            ..Config::default()
        };
        assert!(matches!(
            decode_cfg::<Struct>(&encoded, cfg),
            Err(Error::DepthExceeded(4))
        ));
        assert_eq!(decode::<Struct>(&encoded).unwrap(), record);
    }

    #[test]
    fn test_declared_size_exceeds_input() {
        // A list declaring 1000 i32 elements with none present.
        let bytes = [0x19, 0xF5, 0xE8, 0x07];
        assert!(matches!(
            decode::<Struct>(&bytes),
            Err(Error::EndOfInput)
        ));
    }
}
