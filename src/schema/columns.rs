//! Output column declarations.
//!
//! A column names a field (dotted paths descend into nested messages) and
//! declares the semantic type its values are coerced to.

use prost_reflect::{FieldDescriptor, Kind};

/// The closed set of column target types.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float32,
    Float64,
    Decimal32 { precision: u32, scale: u32 },
    Decimal64 { precision: u32, scale: u32 },
    Decimal128 { precision: u32, scale: u32 },
    /// Days since the Unix epoch.
    Date,
    /// Seconds since the Unix epoch.
    DateTime,
    Uuid,
    /// Values restricted to the supplied (name, value) mapping.
    Enum8(Vec<(String, i8)>),
    Enum16(Vec<(String, i16)>),
    String,
    Bytes,
    /// Raw payload handed to the sink for external deserialization.
    Opaque,
}

/// One projected output column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Field name, with dots descending into nested messages.
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Natural column type for a descriptor field, `None` for message fields.
pub fn default_column_type(field: &FieldDescriptor) -> Option<ColumnType> {
    match field.kind() {
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Some(ColumnType::Int32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Some(ColumnType::Int64),
        Kind::Uint32 | Kind::Fixed32 => Some(ColumnType::UInt32),
        Kind::Uint64 | Kind::Fixed64 => Some(ColumnType::UInt64),
        Kind::Float => Some(ColumnType::Float32),
        Kind::Double => Some(ColumnType::Float64),
        Kind::Bool => Some(ColumnType::UInt8),
        Kind::String => Some(ColumnType::String),
        Kind::Bytes => Some(ColumnType::Bytes),
        Kind::Enum(_) => Some(ColumnType::String),
        Kind::Message(_) => None,
    }
}
