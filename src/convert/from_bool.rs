//! Converter for bool fields: nonzero varint is true, rendered as
//! "true"/"false" for string targets and 0/1 everywhere else.

use prost_reflect::FieldDescriptor;

use crate::convert::{value_error, CastTarget, ConvertError};
use crate::wire::{ByteSource, ScanError, WireScanner};

pub struct FromBool {
    field: FieldDescriptor,
}

impl FromBool {
    pub(crate) fn new(field: FieldDescriptor) -> Self {
        Self { field }
    }

    pub(crate) fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    fn read_field<S: ByteSource>(
        &self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<bool>, ScanError> {
        Ok(scanner.read_uint()?.map(|n| n != 0))
    }

    pub fn read_string_into<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        buf: &mut Vec<u8>,
    ) -> Result<bool, ConvertError> {
        let Some(b) = self.read_field(scanner)? else {
            return Ok(false);
        };
        buf.extend_from_slice(if b { b"true" } else { b"false" });
        Ok(true)
    }

    pub(crate) fn read_numeric<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        let Some(b) = self.read_field(scanner)? else {
            return Ok(None);
        };
        match T::from_u64(b as u64) {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, (b as u64).to_string(), T::NAME)),
        }
    }

    pub fn read_decimal32<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<i32>, ConvertError> {
        Ok(self.read_field(scanner)?.map(|b| b as i32))
    }

    pub fn read_decimal64<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<i64>, ConvertError> {
        Ok(self.read_field(scanner)?.map(|b| b as i64))
    }

    pub fn read_decimal128<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<i128>, ConvertError> {
        Ok(self.read_field(scanner)?.map(|b| b as i128))
    }
}
