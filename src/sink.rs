//! Column sink trait for schema-driven decoding.
//!
//! The reader emits typed values at caller-assigned column indices, in
//! whatever order fields appear on the wire. Sink implementations store
//! them; columns with no emission in a row denote absence. Enum values
//! arrive through `push_i8`/`push_i16`, decimals as raw scaled integers.

use uuid::Uuid;

/// A sink that receives `(column_index, typed_value)` emissions.
pub trait ColumnSink {
    type Error;

    fn push_i8(&mut self, column: usize, value: i8) -> Result<(), Self::Error>;
    fn push_i16(&mut self, column: usize, value: i16) -> Result<(), Self::Error>;
    fn push_i32(&mut self, column: usize, value: i32) -> Result<(), Self::Error>;
    fn push_i64(&mut self, column: usize, value: i64) -> Result<(), Self::Error>;
    fn push_u8(&mut self, column: usize, value: u8) -> Result<(), Self::Error>;
    fn push_u16(&mut self, column: usize, value: u16) -> Result<(), Self::Error>;
    fn push_u32(&mut self, column: usize, value: u32) -> Result<(), Self::Error>;
    fn push_u64(&mut self, column: usize, value: u64) -> Result<(), Self::Error>;
    fn push_u128(&mut self, column: usize, value: u128) -> Result<(), Self::Error>;
    fn push_f32(&mut self, column: usize, value: f32) -> Result<(), Self::Error>;
    fn push_f64(&mut self, column: usize, value: f64) -> Result<(), Self::Error>;

    /// Raw scaled decimal integers at the column's declared precision and
    /// scale.
    fn push_decimal32(&mut self, column: usize, value: i32) -> Result<(), Self::Error>;
    fn push_decimal64(&mut self, column: usize, value: i64) -> Result<(), Self::Error>;
    fn push_decimal128(&mut self, column: usize, value: i128) -> Result<(), Self::Error>;

    /// Days since the Unix epoch.
    fn push_date(&mut self, column: usize, days: u16) -> Result<(), Self::Error>;

    /// Seconds since the Unix epoch.
    fn push_date_time(&mut self, column: usize, seconds: u32) -> Result<(), Self::Error>;

    fn push_uuid(&mut self, column: usize, value: Uuid) -> Result<(), Self::Error>;
    fn push_str(&mut self, column: usize, value: &str) -> Result<(), Self::Error>;
    fn push_bytes(&mut self, column: usize, value: &[u8]) -> Result<(), Self::Error>;

    /// Complete the current row.
    fn finish_row(&mut self) -> Result<(), Self::Error>;
}
