//! Logical types, compact type codes, and the headers exchanged with a [crate::Reader] or
//! [crate::Writer].
//!
//! # Type Codes
//!
//! Callers describe values with the logical [Type]. On the wire every type is identified by a
//! 4-bit compact code:
//!
//! ```text
//! +------+------------+    +------+------------+
//! | code | type       |    | code | type       |
//! +------+------------+    +------+------------+
//! | 0x0  | stop       |    | 0x7  | double     |
//! | 0x1  | bool true  |    | 0x8  | binary     |
//! | 0x2  | bool false |    | 0x9  | list       |
//! | 0x3  | byte       |    | 0xA  | set        |
//! | 0x4  | i16        |    | 0xB  | map        |
//! | 0x5  | i32        |    | 0xC  | struct     |
//! | 0x6  | i64        |    |      |            |
//! +------+------------+    +------+------------+
//! ```
//!
//! Booleans have two codes so that the value of a boolean field can be folded into its header.

use crate::Error;

/// Compact code terminating the field list of a struct.
pub const STOP: u8 = 0x00;
/// Compact code of a `true` boolean (and of the boolean element type in collection headers).
pub const BOOLEAN_TRUE: u8 = 0x01;
/// Compact code of a `false` boolean.
pub const BOOLEAN_FALSE: u8 = 0x02;
const BYTE: u8 = 0x03;
const I16: u8 = 0x04;
const I32: u8 = 0x05;
const I64: u8 = 0x06;
const DOUBLE: u8 = 0x07;
const BINARY: u8 = 0x08;
const LIST: u8 = 0x09;
const SET: u8 = 0x0A;
const MAP: u8 = 0x0B;
const STRUCT: u8 = 0x0C;

/// The logical type of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Stop,
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    /// Raw bytes or a UTF-8 string (the wire does not distinguish them).
    Binary,
    List,
    Set,
    Map,
    Struct,
}

impl Type {
    /// Returns the compact code used to write this type.
    ///
    /// [Type::Bool] maps to [BOOLEAN_TRUE]; field headers override it with the value.
    pub const fn compact(self) -> u8 {
        match self {
            Self::Stop => STOP,
            Self::Bool => BOOLEAN_TRUE,
            Self::Byte => BYTE,
            Self::I16 => I16,
            Self::I32 => I32,
            Self::I64 => I64,
            Self::Double => DOUBLE,
            Self::Binary => BINARY,
            Self::List => LIST,
            Self::Set => SET,
            Self::Map => MAP,
            Self::Struct => STRUCT,
        }
    }

    /// Resolves the compact code stored in the low nibble of `byte`.
    pub fn from_compact(byte: u8) -> Result<Self, Error> {
        match byte & 0x0F {
            STOP => Ok(Self::Stop),
            BOOLEAN_TRUE | BOOLEAN_FALSE => Ok(Self::Bool),
            BYTE => Ok(Self::Byte),
            I16 => Ok(Self::I16),
            I32 => Ok(Self::I32),
            I64 => Ok(Self::I64),
            DOUBLE => Ok(Self::Double),
            BINARY => Ok(Self::Binary),
            LIST => Ok(Self::List),
            SET => Ok(Self::Set),
            MAP => Ok(Self::Map),
            STRUCT => Ok(Self::Struct),
            code => Err(Error::UnknownType(code)),
        }
    }
}

/// First byte of every message header.
pub const PROTOCOL_ID: u8 = 0x82;
/// Protocol version stored in the low bits of the second message header byte.
pub const VERSION: u8 = 1;
pub(crate) const VERSION_MASK: u8 = 0x1F;
/// Mask of the kind once shifted down (2 bits; the top bit of the byte is ignored).
pub(crate) const KIND_MASK: u8 = 0x03;
pub(crate) const KIND_SHIFT: u32 = 5;

/// Kinds of message carried in bits 5 and 6 of a message header's version byte.
pub mod kind {
    pub const CALL: u8 = 1;
    pub const REPLY: u8 = 2;
    pub const EXCEPTION: u8 = 3;
}

/// A message envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    /// One of the [kind] constants (any 3-bit value is accepted on read).
    pub kind: u8,
    pub seq_id: i32,
}

/// Identifies a struct member on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldHeader {
    pub id: i16,
    pub ty: Type,
}

impl FieldHeader {
    pub const fn new(id: i16, ty: Type) -> Self {
        Self { id, ty }
    }
}

/// Header of a list or set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionHeader {
    pub element: Type,
    pub size: usize,
}

impl CollectionHeader {
    pub const fn new(element: Type, size: usize) -> Self {
        Self { element, size }
    }
}

/// Header of a map.
///
/// An empty map is written as a single zero byte without key or value types, so a decoded
/// empty map reports both types as `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapHeader {
    pub key: Option<Type>,
    pub value: Option<Type>,
    pub size: usize,
}

impl MapHeader {
    pub const fn new(key: Type, value: Type, size: usize) -> Self {
        Self {
            key: Some(key),
            value: Some(value),
            size,
        }
    }
}
