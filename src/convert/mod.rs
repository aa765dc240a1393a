//! Value conversion from wire-encoded protobuf scalars to output column
//! types.
//!
//! Each protobuf field gets one converter, selected by its descriptor type
//! at schema-match time. A converter knows how to pull one value from the
//! scanner and coerce it to any member of the closed set of target column
//! types, raising a uniform cast error when the coercion is unsupported or
//! the value does not fit.

mod decimal;
mod from_bool;
mod from_enum;
mod from_number;
mod from_string;

pub use from_bool::FromBool;
pub use from_enum::FromEnum;
pub use from_number::{FromNumber, NumberKind};
pub use from_string::FromString;

use prost_reflect::{FieldDescriptor, Kind};
use thiserror::Error;
use uuid::Uuid;

use crate::wire::{ByteSource, ScanError, WireScanner};

/// Errors raised while coercing a wire value to a column type.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Could not convert type '{wire}' from field '{field}' to data type '{target}'")]
    Type {
        wire: &'static str,
        field: String,
        target: &'static str,
    },

    #[error("Could not convert value '{value}' from field '{field}' to data type '{target}'")]
    Value {
        value: String,
        field: String,
        target: &'static str,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Protobuf type name of a field, as spelled in .proto sources.
pub(crate) fn kind_name(kind: &Kind) -> &'static str {
    match kind {
        Kind::Double => "double",
        Kind::Float => "float",
        Kind::Int32 => "int32",
        Kind::Int64 => "int64",
        Kind::Uint32 => "uint32",
        Kind::Uint64 => "uint64",
        Kind::Sint32 => "sint32",
        Kind::Sint64 => "sint64",
        Kind::Fixed32 => "fixed32",
        Kind::Fixed64 => "fixed64",
        Kind::Sfixed32 => "sfixed32",
        Kind::Sfixed64 => "sfixed64",
        Kind::Bool => "bool",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Message(_) => "message",
        Kind::Enum(_) => "enum",
    }
}

pub(crate) fn type_error(field: &FieldDescriptor, target: &'static str) -> ConvertError {
    ConvertError::Type {
        wire: kind_name(&field.kind()),
        field: field.name().to_string(),
        target,
    }
}

pub(crate) fn value_error(
    field: &FieldDescriptor,
    value: impl Into<String>,
    target: &'static str,
) -> ConvertError {
    ConvertError::Value {
        value: value.into(),
        field: field.name().to_string(),
        target,
    }
}

/// A numeric column target: range-checked construction from each of the
/// carrier types a wire value can arrive as.
pub(crate) trait CastTarget: Sized + std::fmt::Display + std::str::FromStr {
    const NAME: &'static str;

    fn from_i32(v: i32) -> Option<Self>;
    fn from_u32(v: u32) -> Option<Self>;
    fn from_i64(v: i64) -> Option<Self>;
    fn from_u64(v: u64) -> Option<Self>;
    fn from_f32(v: f32) -> Option<Self>;
    fn from_f64(v: f64) -> Option<Self>;
}

macro_rules! impl_cast_target_int {
    ($($t:ty => $name:literal),* $(,)?) => {$(
        impl CastTarget for $t {
            const NAME: &'static str = $name;

            fn from_i32(v: i32) -> Option<Self> {
                Self::try_from(v).ok()
            }

            fn from_u32(v: u32) -> Option<Self> {
                Self::try_from(v).ok()
            }

            fn from_i64(v: i64) -> Option<Self> {
                Self::try_from(v).ok()
            }

            fn from_u64(v: u64) -> Option<Self> {
                Self::try_from(v).ok()
            }

            fn from_f32(v: f32) -> Option<Self> {
                Self::from_f64(v as f64)
            }

            fn from_f64(v: f64) -> Option<Self> {
                if !v.is_finite() {
                    return None;
                }
                let truncated = v.trunc();
                if truncated < <$t>::MIN as f64 || truncated > <$t>::MAX as f64 {
                    return None;
                }
                Some(truncated as $t)
            }
        }
    )*};
}

impl_cast_target_int! {
    i8 => "Int8",
    i16 => "Int16",
    i32 => "Int32",
    i64 => "Int64",
    u8 => "UInt8",
    u16 => "UInt16",
    u32 => "UInt32",
    u64 => "UInt64",
    u128 => "UInt128",
}

impl CastTarget for f32 {
    const NAME: &'static str = "Float32";

    fn from_i32(v: i32) -> Option<Self> {
        Some(v as f32)
    }

    fn from_u32(v: u32) -> Option<Self> {
        Some(v as f32)
    }

    fn from_i64(v: i64) -> Option<Self> {
        Some(v as f32)
    }

    fn from_u64(v: u64) -> Option<Self> {
        Some(v as f32)
    }

    fn from_f32(v: f32) -> Option<Self> {
        Some(v)
    }

    fn from_f64(v: f64) -> Option<Self> {
        if v.is_finite() && (v > f32::MAX as f64 || v < f32::MIN as f64) {
            return None;
        }
        Some(v as f32)
    }
}

impl CastTarget for f64 {
    const NAME: &'static str = "Float64";

    fn from_i32(v: i32) -> Option<Self> {
        Some(v as f64)
    }

    fn from_u32(v: u32) -> Option<Self> {
        Some(v as f64)
    }

    fn from_i64(v: i64) -> Option<Self> {
        Some(v as f64)
    }

    fn from_u64(v: u64) -> Option<Self> {
        Some(v as f64)
    }

    fn from_f32(v: f32) -> Option<Self> {
        Some(v as f64)
    }

    fn from_f64(v: f64) -> Option<Self> {
        Some(v)
    }
}

/// A scalar pulled off the wire in its smallest lossless carrier type.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WireNumber {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl WireNumber {
    pub(crate) fn cast<T: CastTarget>(self) -> Option<T> {
        match self {
            WireNumber::I32(v) => T::from_i32(v),
            WireNumber::U32(v) => T::from_u32(v),
            WireNumber::I64(v) => T::from_i64(v),
            WireNumber::U64(v) => T::from_u64(v),
            WireNumber::F32(v) => T::from_f32(v),
            WireNumber::F64(v) => T::from_f64(v),
        }
    }

    pub(crate) fn render(self) -> String {
        match self {
            WireNumber::I32(v) => v.to_string(),
            WireNumber::U32(v) => v.to_string(),
            WireNumber::I64(v) => v.to_string(),
            WireNumber::U64(v) => v.to_string(),
            WireNumber::F32(v) => v.to_string(),
            WireNumber::F64(v) => v.to_string(),
        }
    }
}

/// One converter per leaf field, tagged by the family its protobuf type
/// falls into.
pub enum Converter {
    String(FromString),
    Number(FromNumber),
    Bool(FromBool),
    Enum(FromEnum),
}

macro_rules! numeric_reads {
    ($(($method:ident, $t:ty)),* $(,)?) => {$(
        pub fn $method<S: ByteSource>(
            &mut self,
            scanner: &mut WireScanner<S>,
        ) -> Result<Option<$t>, ConvertError> {
            match self {
                Converter::String(c) => c.read_numeric(scanner),
                Converter::Number(c) => c.read_numeric(scanner),
                Converter::Bool(c) => c.read_numeric(scanner),
                Converter::Enum(c) => c.read_numeric(scanner),
            }
        }
    )*};
}

impl Converter {
    /// Select the converter family for a scalar field. Returns `None` for
    /// message-typed fields, which are containers rather than values.
    pub fn from_field(field: &FieldDescriptor) -> Option<Converter> {
        let kind = field.kind();
        let number_kind = match kind {
            Kind::String | Kind::Bytes => {
                return Some(Converter::String(FromString::new(field.clone())));
            }
            Kind::Bool => return Some(Converter::Bool(FromBool::new(field.clone()))),
            Kind::Enum(e) => return Some(Converter::Enum(FromEnum::new(field.clone(), e))),
            Kind::Message(_) => return None,
            Kind::Int32 => NumberKind::Int32,
            Kind::Sint32 => NumberKind::SInt32,
            Kind::Uint32 => NumberKind::UInt32,
            Kind::Int64 => NumberKind::Int64,
            Kind::Sint64 => NumberKind::SInt64,
            Kind::Uint64 => NumberKind::UInt64,
            Kind::Fixed32 => NumberKind::Fixed32,
            Kind::Sfixed32 => NumberKind::SFixed32,
            Kind::Fixed64 => NumberKind::Fixed64,
            Kind::Sfixed64 => NumberKind::SFixed64,
            Kind::Float => NumberKind::Float,
            Kind::Double => NumberKind::Double,
        };
        Some(Converter::Number(FromNumber::new(field.clone(), number_kind)))
    }

    pub fn field(&self) -> &FieldDescriptor {
        match self {
            Converter::String(c) => c.field(),
            Converter::Number(c) => c.field(),
            Converter::Bool(c) => c.field(),
            Converter::Enum(c) => c.field(),
        }
    }

    /// Append the field's value rendered as bytes. Strings and bytes pass
    /// through unchanged, numbers render as text, bools as "true"/"false",
    /// enums as their descriptor name.
    pub fn read_string_into<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        buf: &mut Vec<u8>,
    ) -> Result<bool, ConvertError> {
        match self {
            Converter::String(c) => c.read_string_into(scanner, buf),
            Converter::Number(c) => c.read_string_into(scanner, buf),
            Converter::Bool(c) => c.read_string_into(scanner, buf),
            Converter::Enum(c) => c.read_string_into(scanner, buf),
        }
    }

    numeric_reads! {
        (read_i8, i8),
        (read_i16, i16),
        (read_i32, i32),
        (read_i64, i64),
        (read_u8, u8),
        (read_u16, u16),
        (read_u32, u32),
        (read_u64, u64),
    }

    pub fn read_u128<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u128>, ConvertError> {
        match self {
            Converter::String(c) => c.read_numeric(scanner),
            Converter::Number(c) => c.read_numeric(scanner),
            Converter::Bool(c) => c.read_numeric(scanner),
            Converter::Enum(c) => Err(type_error(c.field(), "UInt128")),
        }
    }

    pub fn read_f32<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<f32>, ConvertError> {
        match self {
            Converter::String(c) => c.read_numeric(scanner),
            Converter::Number(c) => c.read_numeric(scanner),
            Converter::Bool(c) => c.read_numeric(scanner),
            Converter::Enum(c) => Err(type_error(c.field(), "Float32")),
        }
    }

    pub fn read_f64<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<f64>, ConvertError> {
        match self {
            Converter::String(c) => c.read_numeric(scanner),
            Converter::Number(c) => c.read_numeric(scanner),
            Converter::Bool(c) => c.read_numeric(scanner),
            Converter::Enum(c) => Err(type_error(c.field(), "Float64")),
        }
    }

    /// Date as days since the Unix epoch.
    pub fn read_date<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u16>, ConvertError> {
        match self {
            Converter::String(c) => c.read_date(scanner),
            Converter::Number(c) => c.read_date(scanner),
            Converter::Bool(c) => Err(type_error(c.field(), "Date")),
            Converter::Enum(c) => Err(type_error(c.field(), "Date")),
        }
    }

    /// DateTime as seconds since the Unix epoch.
    pub fn read_date_time<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u32>, ConvertError> {
        match self {
            Converter::String(c) => c.read_date_time(scanner),
            Converter::Number(c) => c.read_date_time(scanner),
            Converter::Bool(c) => Err(type_error(c.field(), "DateTime")),
            Converter::Enum(c) => Err(type_error(c.field(), "DateTime")),
        }
    }

    pub fn read_uuid<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<Uuid>, ConvertError> {
        match self {
            Converter::String(c) => c.read_uuid(scanner),
            Converter::Number(c) => Err(type_error(c.field(), "UUID")),
            Converter::Bool(c) => Err(type_error(c.field(), "UUID")),
            Converter::Enum(c) => Err(type_error(c.field(), "UUID")),
        }
    }

    /// Decimal with the given precision and scale, returned as the raw
    /// scaled integer.
    pub fn read_decimal32<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i32>, ConvertError> {
        match self {
            Converter::String(c) => c.read_decimal32(scanner, precision, scale),
            Converter::Number(c) => c.read_decimal32(scanner, precision, scale),
            Converter::Bool(c) => c.read_decimal32(scanner),
            Converter::Enum(c) => Err(type_error(c.field(), "Decimal32")),
        }
    }

    pub fn read_decimal64<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i64>, ConvertError> {
        match self {
            Converter::String(c) => c.read_decimal64(scanner, precision, scale),
            Converter::Number(c) => c.read_decimal64(scanner, precision, scale),
            Converter::Bool(c) => c.read_decimal64(scanner),
            Converter::Enum(c) => Err(type_error(c.field(), "Decimal64")),
        }
    }

    pub fn read_decimal128<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i128>, ConvertError> {
        match self {
            Converter::String(c) => c.read_decimal128(scanner, precision, scale),
            Converter::Number(c) => c.read_decimal128(scanner, precision, scale),
            Converter::Bool(c) => c.read_decimal128(scanner),
            Converter::Enum(c) => Err(type_error(c.field(), "Decimal128")),
        }
    }

    /// Install the (name, value) mapping used by enum targets. Idempotent;
    /// families that do not support enum targets ignore it.
    pub fn prepare_enum_mapping8(&mut self, pairs: &[(String, i8)]) {
        match self {
            Converter::String(c) => c.prepare_enum_mapping(pairs.iter().map(|(n, v)| (n.clone(), *v as i16))),
            Converter::Number(c) => c.prepare_enum_values(pairs.iter().map(|(_, v)| *v as i16)),
            Converter::Bool(_) => {}
            Converter::Enum(c) => c.prepare_enum_mapping(pairs.iter().map(|(n, v)| (n.as_str(), *v as i16))),
        }
    }

    pub fn prepare_enum_mapping16(&mut self, pairs: &[(String, i16)]) {
        match self {
            Converter::String(c) => c.prepare_enum_mapping(pairs.iter().map(|(n, v)| (n.clone(), *v))),
            Converter::Number(c) => c.prepare_enum_values(pairs.iter().map(|(_, v)| *v)),
            Converter::Bool(_) => {}
            Converter::Enum(c) => c.prepare_enum_mapping(pairs.iter().map(|(n, v)| (n.as_str(), *v))),
        }
    }

    pub fn read_enum8<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<i8>, ConvertError> {
        match self {
            Converter::String(c) => c.read_enum(scanner),
            Converter::Number(c) => c.read_enum(scanner),
            Converter::Bool(c) => Err(type_error(c.field(), "Enum")),
            Converter::Enum(c) => c.read_enum(scanner),
        }
    }

    pub fn read_enum16<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<i16>, ConvertError> {
        match self {
            Converter::String(c) => c.read_enum(scanner),
            Converter::Number(c) => c.read_enum(scanner),
            Converter::Bool(c) => Err(type_error(c.field(), "Enum")),
            Converter::Enum(c) => c.read_enum(scanner),
        }
    }

    /// Hand the field's raw bytes to an external deserializer. Only
    /// string/bytes fields carry opaque payloads.
    pub fn read_opaque_with<S: ByteSource, R>(
        &mut self,
        scanner: &mut WireScanner<S>,
        deserialize: impl FnOnce(&[u8]) -> std::io::Result<R>,
    ) -> Result<Option<R>, ConvertError> {
        match self {
            Converter::String(c) => c.read_opaque_with(scanner, deserialize),
            Converter::Number(c) => Err(type_error(c.field(), "Opaque")),
            Converter::Bool(c) => Err(type_error(c.field(), "Opaque")),
            Converter::Enum(c) => Err(type_error(c.field(), "Opaque")),
        }
    }
}
