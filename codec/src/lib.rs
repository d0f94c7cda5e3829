//! Encode and decode the compact binary protocol.
//!
//! # Overview
//!
//! A dense binary encoding of structured records in which:
//! - Integers are ZigZag varints (small magnitudes, positive or negative, take one byte)
//! - Field ids are delta-encoded against the previous field of the same struct
//! - Type codes fit in a nibble and share a byte with a field delta or collection size
//! - The value of a boolean field is folded into its field header
//!
//! # Sessions
//!
//! Decoding happens through a [Reader] and encoding through a [Writer]. Each is a single-owner
//! session holding the per-struct field id stack and the pending boolean slot, so two
//! sessions never share state. A [Reader] pulls bytes from any [Input]: a plain `&[u8]`, or a
//! chunked transport that hands out zero-copy spans.
//!
//! # Example
//!
//! ```
//! use bytes::BufMut;
//! use slipstream_codec::{decode, encode, Error, FieldHeader, Input, Reader, Record, Type, Writer};
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Record for Point {
//!     fn read<I: Input>(reader: &mut Reader<I>) -> Result<Self, Error> {
//!         let (mut x, mut y) = (0, 0);
//!         reader.read_struct_begin()?;
//!         while let Some(field) = reader.read_field_begin()? {
//!             match (field.id, field.ty) {
//!                 (1, Type::I32) => x = reader.read_i32()?,
//!                 (2, Type::I32) => y = reader.read_i32()?,
//!                 (_, ty) => reader.skip(ty)?,
//!             }
//!             reader.read_field_end();
//!         }
//!         reader.read_struct_end()?;
//!         Ok(Self { x, y })
//!     }
//!
//!     fn write<B: BufMut>(&self, writer: &mut Writer<B>) -> Result<(), Error> {
//!         writer.write_struct_begin();
//!         writer.write_field_begin(FieldHeader::new(1, Type::I32))?;
//!         writer.write_i32(self.x);
//!         writer.write_field_begin(FieldHeader::new(2, Type::I32))?;
//!         writer.write_i32(self.y);
//!         writer.write_field_stop()?;
//!         writer.write_struct_end()
//!     }
//! }
//!
//! let point = Point { x: 3, y: -4 };
//! let encoded = encode(&point).unwrap();
//! assert_eq!(&encoded[..], &[0x15, 0x06, 0x15, 0x07, 0x00]);
//! assert_eq!(decode::<Point>(&encoded).unwrap(), point);
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod reader;
pub mod record;
pub mod types;
pub mod value;
pub mod varint;
pub mod writer;

pub use config::Config;
pub use error::Error;
pub use input::Input;
pub use reader::Reader;
pub use record::{decode, decode_cfg, encode, Record};
pub use types::{kind, CollectionHeader, FieldHeader, MapHeader, MessageHeader, Type};
pub use value::{Struct, Value};
pub use writer::Writer;
