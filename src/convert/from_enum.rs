//! Converter for enum fields.
//!
//! The wire carries the protobuf enum number. String targets resolve it to
//! the descriptor name; enum targets resolve it through the caller-supplied
//! (name, value) mapping; numeric targets range-cast the number itself.

use std::collections::HashMap;

use prost_reflect::{EnumDescriptor, FieldDescriptor};

use crate::convert::{value_error, CastTarget, ConvertError};
use crate::wire::{ByteSource, ScanError, WireScanner};

pub struct FromEnum {
    field: FieldDescriptor,
    enum_desc: EnumDescriptor,
    number_to_name: Option<HashMap<i64, String>>,
    number_to_value: Option<HashMap<i64, i16>>,
}

impl FromEnum {
    pub(crate) fn new(field: FieldDescriptor, enum_desc: EnumDescriptor) -> Self {
        Self {
            field,
            enum_desc,
            number_to_name: None,
            number_to_value: None,
        }
    }

    pub(crate) fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    fn read_field<S: ByteSource>(
        &self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<i64>, ScanError> {
        scanner.read_int()
    }

    pub fn read_string_into<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        buf: &mut Vec<u8>,
    ) -> Result<bool, ConvertError> {
        if self.number_to_name.is_none() {
            self.number_to_name = Some(
                self.enum_desc
                    .values()
                    .map(|v| (v.number() as i64, v.name().to_string()))
                    .collect(),
            );
        }
        let Some(number) = self.read_field(scanner)? else {
            return Ok(false);
        };
        let name = self
            .number_to_name
            .as_ref()
            .and_then(|map| map.get(&number));
        match name {
            Some(name) => {
                buf.extend_from_slice(name.as_bytes());
                Ok(true)
            }
            None => Err(value_error(&self.field, number.to_string(), "Enum")),
        }
    }

    pub(crate) fn read_numeric<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        let Some(number) = self.read_field(scanner)? else {
            return Ok(None);
        };
        match T::from_i64(number) {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, number.to_string(), T::NAME)),
        }
    }

    /// Map protobuf numbers to target values by resolving each supplied
    /// name through the enum descriptor. Names the descriptor does not
    /// know are dropped.
    pub(crate) fn prepare_enum_mapping<'a>(
        &mut self,
        pairs: impl Iterator<Item = (&'a str, i16)>,
    ) {
        if self.number_to_value.is_some() {
            return;
        }
        let mut map = HashMap::new();
        for (name, value) in pairs {
            if let Some(descriptor_value) = self.enum_desc.get_value_by_name(name) {
                map.insert(descriptor_value.number() as i64, value);
            }
        }
        self.number_to_value = Some(map);
    }

    pub(crate) fn read_enum<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        let Some(number) = self.read_field(scanner)? else {
            return Ok(None);
        };
        let value = self
            .number_to_value
            .as_ref()
            .and_then(|map| map.get(&number).copied())
            .and_then(|v| T::from_i64(v as i64));
        match value {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, number.to_string(), "Enum")),
        }
    }
}
