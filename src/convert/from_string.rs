//! Converter for string and bytes fields.
//!
//! The wire payload passes through unchanged for string targets; every
//! other target parses the payload through its textual grammar.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use prost_reflect::FieldDescriptor;
use uuid::Uuid;

use crate::convert::{decimal, value_error, CastTarget, ConvertError};
use crate::wire::{ByteSource, ScanError, WireScanner};

pub struct FromString {
    field: FieldDescriptor,
    /// Scratch buffer reused across reads.
    text: Vec<u8>,
    enum_name_to_value: Option<HashMap<String, i16>>,
}

impl FromString {
    pub(crate) fn new(field: FieldDescriptor) -> Self {
        Self {
            field,
            text: Vec::new(),
            enum_name_to_value: None,
        }
    }

    pub(crate) fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    fn read_text<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<bool, ScanError> {
        self.text.clear();
        scanner.read_string_into(&mut self.text)
    }

    fn lossy_text(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }

    pub fn read_string_into<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        buf: &mut Vec<u8>,
    ) -> Result<bool, ConvertError> {
        Ok(scanner.read_string_into(buf)?)
    }

    pub(crate) fn read_numeric<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let parsed = std::str::from_utf8(&self.text)
            .ok()
            .and_then(|s| s.parse::<T>().ok());
        match parsed {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, self.lossy_text(), T::NAME)),
        }
    }

    pub fn read_uuid<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<Uuid>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let parsed = std::str::from_utf8(&self.text)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok());
        match parsed {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, self.lossy_text(), "UUID")),
        }
    }

    pub fn read_date<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u16>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let parsed = std::str::from_utf8(&self.text).ok().and_then(parse_date);
        match parsed {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, self.lossy_text(), "Date")),
        }
    }

    pub fn read_date_time<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<u32>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let parsed = std::str::from_utf8(&self.text)
            .ok()
            .and_then(parse_date_time);
        match parsed {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, self.lossy_text(), "DateTime")),
        }
    }

    pub fn read_decimal32<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
    ) -> Result<Option<i32>, ConvertError> {
        match self.read_decimal_raw(scanner, precision, scale, "Decimal32")? {
            Some(v) => match i32::try_from(v) {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(value_error(&self.field, self.lossy_text(), "Decimal32")),
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
            Some(v) => match i64::try_from(v) {
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(value_error(&self.field, self.lossy_text(), "Decimal64")),
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
        self.read_decimal_raw(scanner, precision, scale, "Decimal128")
    }

    fn read_decimal_raw<S: ByteSource>(
        &mut self,
        scanner: &mut WireScanner<S>,
        precision: u32,
        scale: u32,
        target: &'static str,
    ) -> Result<Option<i128>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let parsed = std::str::from_utf8(&self.text)
            .ok()
            .and_then(|s| decimal::parse_text(s, precision, scale));
        match parsed {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, self.lossy_text(), target)),
        }
    }

    pub(crate) fn prepare_enum_mapping(&mut self, pairs: impl Iterator<Item = (String, i16)>) {
        if self.enum_name_to_value.is_some() {
            return;
        }
        self.enum_name_to_value = Some(pairs.collect());
    }

    pub(crate) fn read_enum<S: ByteSource, T: CastTarget>(
        &mut self,
        scanner: &mut WireScanner<S>,
    ) -> Result<Option<T>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let map = self.enum_name_to_value.get_or_insert_with(HashMap::new);
        let value = std::str::from_utf8(&self.text)
            .ok()
            .and_then(|s| map.get(s).copied())
            .and_then(|v| T::from_i64(v as i64));
        match value {
            Some(v) => Ok(Some(v)),
            None => Err(value_error(&self.field, self.lossy_text(), "Enum")),
        }
    }

    pub fn read_opaque_with<S: ByteSource, R>(
        &mut self,
        scanner: &mut WireScanner<S>,
        deserialize: impl FnOnce(&[u8]) -> std::io::Result<R>,
    ) -> Result<Option<R>, ConvertError> {
        if !self.read_text(scanner)? {
            return Ok(None);
        }
        let value = deserialize(&self.text).map_err(ScanError::Io)?;
        Ok(Some(value))
    }
}

fn parse_date(s: &str) -> Option<u16> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    u16::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

fn parse_date_time(s: &str) -> Option<u32> {
    let dt = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    u32::try_from(dt.and_utc().timestamp()).ok()
}
