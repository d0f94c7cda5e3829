//! Human-readable rendering of dynamic values.

use slipstream_codec::{MessageHeader, Struct, Type, Value};
use std::fmt;

const INDENT: usize = 2;

/// Returns the name printed for a type.
pub fn type_name(ty: Type) -> &'static str {
    match ty {
        Type::Stop => "stop",
        Type::Bool => "bool",
        Type::Byte => "byte",
        Type::I16 => "i16",
        Type::I32 => "i32",
        Type::I64 => "i64",
        Type::Double => "double",
        Type::Binary => "binary",
        Type::List => "list",
        Type::Set => "set",
        Type::Map => "map",
        Type::Struct => "struct",
    }
}

fn optional_type_name(ty: Option<Type>) -> &'static str {
    ty.map_or("?", type_name)
}

/// Displays a message header on one line.
pub struct Message<'a>(pub &'a MessageHeader);

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "message {} (kind={}, seq_id={})",
            self.0.name, self.0.kind, self.0.seq_id
        )
    }
}

/// Displays a struct with one field per line.
///
/// Binary values are printed as quoted strings when they are valid UTF-8 and as hex otherwise.
pub struct Record<'a>(pub &'a Struct);

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_struct(f, self.0, 0)
    }
}

fn write_struct(f: &mut fmt::Formatter<'_>, value: &Struct, indent: usize) -> fmt::Result {
    if value.fields.is_empty() {
        return write!(f, "struct {{}}");
    }
    writeln!(f, "struct {{")?;
    for (id, field) in &value.fields {
        write!(f, "{:width$}{}: ", "", id, width = indent + INDENT)?;
        write_value(f, field, indent + INDENT)?;
        writeln!(f)?;
    }
    write!(f, "{:width$}}}", "", width = indent)
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value], indent: usize) -> fmt::Result {
    if items.is_empty() {
        return write!(f, "[]");
    }
    writeln!(f, "[")?;
    for item in items {
        write!(f, "{:width$}", "", width = indent + INDENT)?;
        write_value(f, item, indent + INDENT)?;
        writeln!(f, ",")?;
    }
    write!(f, "{:width$}]", "", width = indent)
}

fn write_binary(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    match std::str::from_utf8(bytes) {
        Ok(text) => write!(f, "{text:?}"),
        Err(_) => {
            write!(f, "0x")?;
            for byte in bytes {
                write!(f, "{byte:02x}")?;
            }
            Ok(())
        }
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, indent: usize) -> fmt::Result {
    match value {
        Value::Bool(v) => write!(f, "bool {v}"),
        Value::Byte(v) => write!(f, "byte {v}"),
        Value::I16(v) => write!(f, "i16 {v}"),
        Value::I32(v) => write!(f, "i32 {v}"),
        Value::I64(v) => write!(f, "i64 {v}"),
        Value::Double(v) => write!(f, "double {v}"),
        Value::Binary(v) => {
            write!(f, "binary ")?;
            write_binary(f, v)
        }
        Value::List { element, items } => {
            write!(f, "list<{}> ", type_name(*element))?;
            write_items(f, items, indent)
        }
        Value::Set { element, items } => {
            write!(f, "set<{}> ", type_name(*element))?;
            write_items(f, items, indent)
        }
        Value::Map {
            key,
            value,
            entries,
        } => {
            write!(
                f,
                "map<{}, {}> ",
                optional_type_name(*key),
                optional_type_name(*value)
            )?;
            if entries.is_empty() {
                return write!(f, "{{}}");
            }
            writeln!(f, "{{")?;
            for (k, v) in entries {
                write!(f, "{:width$}", "", width = indent + INDENT)?;
                write_value(f, k, indent + INDENT)?;
                write!(f, " => ")?;
                write_value(f, v, indent + INDENT)?;
                writeln!(f, ",")?;
            }
            write!(f, "{:width$}}}", "", width = indent)
        }
        Value::Struct(s) => write_struct(f, s, indent),
    }
}
