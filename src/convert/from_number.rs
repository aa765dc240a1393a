//! Converter for the numeric wire types.
//!
//! One instance per field, parameterized by how the value is pulled off the
//! wire (varint, zigzag, fixed width) and carried in the smallest lossless
//! native type.

use std::collections::HashSet;

use prost_reflect::FieldDescriptor;

use crate::convert::{decimal, type_error, value_error, CastTarget, ConvertError, WireNumber};
use crate::wire::{ByteSource, ScanError, WireScanner};

/// How a numeric field's payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int32,
    SInt32,
    UInt32,
    Int64,
    SInt64,
    UInt64,
    Fixed32,
    SFixed32,
    Fixed64,
    SFixed64,
    Float,
    Double,
}

impl NumberKind {
    fn is_integral(self) -> bool {
        !matches!(self, NumberKind::Float | NumberKind::Double)
    }
}

pub struct FromNumber {
    field: FieldDescriptor,
    kind: NumberKind,
    enum_values: Option<HashSet<i16>>,
}

impl FromNumber {
    pub(crate) fn new(field: FieldDescriptor, kind: NumberKind) -> Self {
        Self {
            field,
            kind,
            enum_values: None,
        }
    }

    pub(crate) fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    fn read_field<S: ByteSource>(
        &self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<WireNumber>, ScanError> {
        Ok(match self.kind {
            NumberKind::Int32 | NumberKind::Int64 => scanner.read_int()?.map(WireNumber::I64),
            NumberKind::SInt32 | NumberKind::SInt64 => scanner.read_sint()?.map(WireNumber::I64),
            NumberKind::UInt32 | NumberKind::UInt64 => scanner.read_uint()?.map(WireNumber::U64),
            NumberKind::Fixed32 => scanner.read_fixed_u32()?.map(WireNumber::U32),
            NumberKind::SFixed32 => scanner.read_fixed_i32()?.map(WireNumber::I32),
            NumberKind::Fixed64 => scanner.read_fixed_u64()?.map(WireNumber::U64),
            NumberKind::SFixed64 => scanner.read_fixed_i64()?.map(WireNumber::I64),
            NumberKind::Float => scanner.read_fixed_f32()?.map(WireNumber::F32),
            NumberKind::Double => scanner.read_fixed_f64()?.map(WireNumber::F64),
        })
    }

    pub fn read_string_into<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        buf: &mut Vec<u8>,
    ) -> Result<bool, ConvertError> {
        let Some(number) = self.read_field(scanner)? else {
            return Ok(false);
        };
        buf.extend_from_slice(number.render().as_bytes());
        Ok(true)
    }

    pub(crate) fn read_numeric<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        let Some(number) = self.read_field(scanner)? else {
            return Ok(None);
        };
        match number.cast::<T>() {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, number.render(), T::NAME)),
        }
    }

    /// Date as a plain day count.
    pub fn read_date<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u16>, ConvertError> {
        self.read_numeric(scanner)
    }

    /// DateTime as a plain second count.
    pub fn read_date_time<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u32>, ConvertError> {
        self.read_numeric(scanner)
    }

    pub fn read_decimal32<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i32>, ConvertError> {
        match self.read_decimal_raw(scanner, precision, scale, "Decimal32")? {
            Some((raw, rendered)) => match i32::try_from(raw) {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(value_error(&self.field, rendered, "Decimal32")),
            },
            None => Ok(None),
        }
    }

    pub fn read_decimal64<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i64>, ConvertError> {
        match self.read_decimal_raw(scanner, precision, scale, "Decimal64")? {
            Some((raw, rendered)) => match i64::try_from(raw) {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(value_error(&self.field, rendered, "Decimal64")),
            },
            None => Ok(None),
        }
    }

    pub fn read_decimal128<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i128>, ConvertError> {
        Ok(self
            .read_decimal_raw(scanner, precision, scale, "Decimal128")?
            .map(|(raw, _)| raw))
    }

    fn read_decimal_raw<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
        target: &'static str,
    ) -> Result<Option<(i128, String)>, ConvertError> {
        let Some(number) = self.read_field(scanner)? else {
            return Ok(None);
        };
        let scaled = match number {
            WireNumber::I32(v) => decimal::from_int(v as i128, precision, scale),
            WireNumber::U32(v) => decimal::from_int(v as i128, precision, scale),
            WireNumber::I64(v) => decimal::from_int(v as i128, precision, scale),
            WireNumber::U64(v) => decimal::from_int(v as i128, precision, scale),
            WireNumber::F32(v) => decimal::from_float(v as f64, precision, scale),
            WireNumber::F64(v) => decimal::from_float(v, precision, scale),
        };
        match scaled {
            Some(raw) => Ok(Some((raw, number.render()))),
            None => Err(value_error(&self.field, number.render(), target)),
        }
    }

    pub(crate) fn prepare_enum_values(&mut self, values: impl Iterator<Item = i16>) {
        if self.enum_values.is_some() {
            return;
        }
        self.enum_values = Some(values.collect());
    }

    /// Enum targets accept only integral carriers whose value appears in
    /// the permitted set.
    pub(crate) fn read_enum<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        if !self.kind.is_integral() {
            return Err(type_error(&self.field, "Enum"));
        }
        let Some(number) = self.read_field(scanner)? else {
            return Ok(None);
        };
        let permitted: Option<i16> = number
            .cast()
            .filter(|v| {
                self.enum_values
                    .as_ref()
                    .is_some_and(|set| set.contains(v))
            });
        match permitted.and_then(|v| T::from_i64(v as i64)) {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, number.render(), "Enum")),
        }
    }
}
