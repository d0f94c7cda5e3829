#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use slipstream_codec::{decode, encode, Struct, Type, Value};

#[derive(Arbitrary, Debug)]
enum FuzzValue {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    Binary(Vec<u8>),
    Ints(Vec<i32>),
    Flags(Vec<bool>),
    Pairs(Vec<(i64, Vec<u8>)>),
    Nested(Vec<(i16, i64)>),
}

impl FuzzValue {
    fn into_value(self) -> Value {
        match self {
            Self::Bool(v) => Value::Bool(v),
            Self::Byte(v) => Value::Byte(v),
            Self::I16(v) => Value::I16(v),
            Self::I32(v) => Value::I32(v),
            Self::I64(v) => Value::I64(v),
            // NaN never compares equal to itself.
            Self::Double(v) if v.is_nan() => Value::Double(0.0),
            Self::Double(v) => Value::Double(v),
            Self::Binary(v) => Value::Binary(Bytes::from(v)),
            Self::Ints(v) => Value::List {
                element: Type::I32,
                items: v.into_iter().map(Value::I32).collect(),
            },
            Self::Flags(v) => Value::Set {
                element: Type::Bool,
                items: v.into_iter().map(Value::Bool).collect(),
            },
            Self::Pairs(v) if v.is_empty() => Value::Map {
                key: None,
                value: None,
                entries: Vec::new(),
            },
            Self::Pairs(v) => Value::Map {
                key: Some(Type::I64),
                value: Some(Type::Binary),
                entries: v
                    .into_iter()
                    .map(|(k, v)| (Value::I64(k), Value::Binary(Bytes::from(v))))
                    .collect(),
            },
            Self::Nested(v) => Value::Struct(Struct {
                fields: v.into_iter().map(|(id, v)| (id, Value::I64(v))).collect(),
            }),
        }
    }
}

fuzz_target!(|fields: Vec<(i16, FuzzValue)>| {
    let record = Struct {
        fields: fields
            .into_iter()
            .map(|(id, value)| (id, value.into_value()))
            .collect(),
    };
    let encoded = encode(&record).expect("failed to encode");
    let decoded: Struct = decode(&encoded).expect("failed to decode");
    assert_eq!(record, decoded);
});
