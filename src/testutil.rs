//! Shared test helpers: programmatic descriptor pools, hand-encoded wire
//! bytes, and a recording sink.

use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};
use uuid::Uuid;

use crate::sink::ColumnSink;

/// Encode a base-128 varint.
pub(crate) fn varint(mut v: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let b = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            out.push(b);
            break;
        }
        out.push(b | 0x80);
    }
    out
}

/// Encode a field key for the given field number and wire type.
pub(crate) fn tag(field: u32, wire_type: u32) -> Vec<u8> {
    varint(((field as u64) << 3) | wire_type as u64)
}

/// Frame a message body with its leading varint length.
pub(crate) fn framed(body: &[u8]) -> Vec<u8> {
    let mut out = varint(body.len() as u64);
    out.extend_from_slice(body);
    out
}

/// A length-delimited field holding `payload`.
pub(crate) fn len_field(field: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = tag(field, 2);
    out.extend(varint(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

pub(crate) fn scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

pub(crate) fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Message as i32),
        type_name: Some(format!(".test.{type_name}")),
        ..Default::default()
    }
}

pub(crate) fn enum_field(name: &str, number: i32, enum_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Enum as i32),
        type_name: Some(format!(".test.{enum_name}")),
        ..Default::default()
    }
}

pub(crate) fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

pub(crate) fn simple_enum(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .map(|(n, v)| EnumValueDescriptorProto {
                name: Some(n.to_string()),
                number: Some(*v),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Build a pool from messages and enums under the `test` package.
pub(crate) fn build_pool(
    messages: Vec<DescriptorProto>,
    enums: Vec<EnumDescriptorProto>,
) -> DescriptorPool {
    let file = FileDescriptorProto {
        name: Some("test.proto".to_string()),
        package: Some("test".to_string()),
        message_type: messages,
        enum_type: enums,
        syntax: Some("proto2".to_string()),
        ..Default::default()
    };
    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
        .expect("valid test descriptors")
}

/// A value recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    F32(f32),
    F64(f64),
    Dec32(i32),
    Dec64(i64),
    Dec128(i128),
    Date(u16),
    DateTime(u32),
    Uuid(Uuid),
    Str(String),
    Bytes(Vec<u8>),
}

/// Records every emission, one list per finished row.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) rows: Vec<Vec<(usize, Recorded)>>,
    current: Vec<(usize, Recorded)>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, column: usize, value: Recorded) -> Result<(), std::convert::Infallible> {
        self.current.push((column, value));
        Ok(())
    }
}

impl ColumnSink for RecordingSink {
    type Error = std::convert::Infallible;

    fn push_i8(&mut self, column: usize, value: i8) -> Result<(), Self::Error> {
        self.record(column, Recorded::I8(value))
    }

    fn push_i16(&mut self, column: usize, value: i16) -> Result<(), Self::Error> {
        self.record(column, Recorded::I16(value))
    }

    fn push_i32(&mut self, column: usize, value: i32) -> Result<(), Self::Error> {
        self.record(column, Recorded::I32(value))
    }

    fn push_i64(&mut self, column: usize, value: i64) -> Result<(), Self::Error> {
        self.record(column, Recorded::I64(value))
    }

    fn push_u8(&mut self, column: usize, value: u8) -> Result<(), Self::Error> {
        self.record(column, Recorded::U8(value))
    }

    fn push_u16(&mut self, column: usize, value: u16) -> Result<(), Self::Error> {
        self.record(column, Recorded::U16(value))
    }

    fn push_u32(&mut self, column: usize, value: u32) -> Result<(), Self::Error> {
        self.record(column, Recorded::U32(value))
    }

    fn push_u64(&mut self, column: usize, value: u64) -> Result<(), Self::Error> {
        self.record(column, Recorded::U64(value))
    }

    fn push_u128(&mut self, column: usize, value: u128) -> Result<(), Self::Error> {
        self.record(column, Recorded::U128(value))
    }

    fn push_f32(&mut self, column: usize, value: f32) -> Result<(), Self::Error> {
        self.record(column, Recorded::F32(value))
    }

    fn push_f64(&mut self, column: usize, value: f64) -> Result<(), Self::Error> {
        self.record(column, Recorded::F64(value))
    }

    fn push_decimal32(&mut self, column: usize, value: i32) -> Result<(), Self::Error> {
        self.record(column, Recorded::Dec32(value))
    }

    fn push_decimal64(&mut self, column: usize, value: i64) -> Result<(), Self::Error> {
        self.record(column, Recorded::Dec64(value))
    }

    fn push_decimal128(&mut self, column: usize, value: i128) -> Result<(), Self::Error> {
        self.record(column, Recorded::Dec128(value))
    }

    fn push_date(&mut self, column: usize, days: u16) -> Result<(), Self::Error> {
        self.record(column, Recorded::Date(days))
    }

    fn push_date_time(&mut self, column: usize, seconds: u32) -> Result<(), Self::Error> {
        self.record(column, Recorded::DateTime(seconds))
    }

    fn push_uuid(&mut self, column: usize, value: Uuid) -> Result<(), Self::Error> {
        self.record(column, Recorded::Uuid(value))
    }

    fn push_str(&mut self, column: usize, value: &str) -> Result<(), Self::Error> {
        self.record(column, Recorded::Str(value.to_string()))
    }

    fn push_bytes(&mut self, column: usize, value: &[u8]) -> Result<(), Self::Error> {
        self.record(column, Recorded::Bytes(value.to_vec()))
    }

    fn finish_row(&mut self) -> Result<(), Self::Error> {
        self.rows.push(std::mem::take(&mut self.current));
        Ok(())
    }
}
