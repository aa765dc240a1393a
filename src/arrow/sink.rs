//! Arrow implementation of ColumnSink.
//!
//! Buffers one row of cells, flushing to per-column Arrow builders when the
//! row finishes; columns with no emission become nulls. Repeated emissions
//! to the same column within a row keep the last value.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, Date32Builder, Decimal128Builder, FixedSizeBinaryBuilder,
    Float32Builder, Float64Builder, Int16Builder, Int32Builder, Int64Builder, Int8Builder,
    RecordBatch, StringBuilder, TimestampSecondBuilder, UInt16Builder, UInt32Builder,
    UInt64Builder, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::{Column, ColumnType};
use crate::sink::ColumnSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("column {0} is out of range")]
    ColumnOutOfRange(usize),

    #[error("type mismatch on column {column}: cannot store {got}")]
    TypeMismatch { column: usize, got: &'static str },

    #[error("column type {0} has no Arrow representation")]
    Unsupported(&'static str),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// One buffered value awaiting row completion.
enum Cell {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(i128),
    Date(u16),
    DateTime(u32),
    Uuid(Uuid),
    Str(String),
    Bytes(Vec<u8>),
}

impl Cell {
    fn name(&self) -> &'static str {
        match self {
            Cell::I8(_) => "Int8",
            Cell::I16(_) => "Int16",
            Cell::I32(_) => "Int32",
            Cell::I64(_) => "Int64",
            Cell::U8(_) => "UInt8",
            Cell::U16(_) => "UInt16",
            Cell::U32(_) => "UInt32",
            Cell::U64(_) => "UInt64",
            Cell::F32(_) => "Float32",
            Cell::F64(_) => "Float64",
            Cell::Decimal(_) => "Decimal",
            Cell::Date(_) => "Date",
            Cell::DateTime(_) => "DateTime",
            Cell::Uuid(_) => "UUID",
            Cell::Str(_) => "String",
            Cell::Bytes(_) => "Bytes",
        }
    }
}

enum ColumnBuilder {
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    UInt8(UInt8Builder),
    UInt16(UInt16Builder),
    UInt32(UInt32Builder),
    UInt64(UInt64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Decimal(Decimal128Builder),
    Date(Date32Builder),
    Timestamp(TimestampSecondBuilder),
    Uuid(FixedSizeBinaryBuilder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
}

impl ColumnBuilder {
    fn new(ty: &ColumnType) -> Result<Self, SinkError> {
        Ok(match ty {
            ColumnType::Int8 | ColumnType::Enum8(_) => ColumnBuilder::Int8(Int8Builder::new()),
            ColumnType::Int16 | ColumnType::Enum16(_) => {
                ColumnBuilder::Int16(Int16Builder::new())
            }
            ColumnType::Int32 => ColumnBuilder::Int32(Int32Builder::new()),
            ColumnType::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            ColumnType::UInt8 => ColumnBuilder::UInt8(UInt8Builder::new()),
            ColumnType::UInt16 => ColumnBuilder::UInt16(UInt16Builder::new()),
            ColumnType::UInt32 => ColumnBuilder::UInt32(UInt32Builder::new()),
            ColumnType::UInt64 => ColumnBuilder::UInt64(UInt64Builder::new()),
            ColumnType::UInt128 => return Err(SinkError::Unsupported("UInt128")),
            ColumnType::Float32 => ColumnBuilder::Float32(Float32Builder::new()),
            ColumnType::Float64 => ColumnBuilder::Float64(Float64Builder::new()),
            ColumnType::Decimal32 { precision, scale }
            | ColumnType::Decimal64 { precision, scale }
            | ColumnType::Decimal128 { precision, scale } => ColumnBuilder::Decimal(
                Decimal128Builder::new()
                    .with_precision_and_scale(*precision as u8, *scale as i8)?,
            ),
            ColumnType::Date => ColumnBuilder::Date(Date32Builder::new()),
            ColumnType::DateTime => ColumnBuilder::Timestamp(TimestampSecondBuilder::new()),
            ColumnType::Uuid => ColumnBuilder::Uuid(FixedSizeBinaryBuilder::new(16)),
            ColumnType::String => ColumnBuilder::Utf8(StringBuilder::new()),
            ColumnType::Bytes | ColumnType::Opaque => {
                ColumnBuilder::Binary(BinaryBuilder::new())
            }
        })
    }

    fn append(&mut self, column: usize, cell: Option<Cell>) -> Result<(), SinkError> {
        match (self, cell) {
            (ColumnBuilder::Int8(b), Some(Cell::I8(v))) => b.append_value(v),
            (ColumnBuilder::Int8(b), None) => b.append_null(),
            (ColumnBuilder::Int16(b), Some(Cell::I16(v))) => b.append_value(v),
            (ColumnBuilder::Int16(b), None) => b.append_null(),
            (ColumnBuilder::Int32(b), Some(Cell::I32(v))) => b.append_value(v),
            (ColumnBuilder::Int32(b), None) => b.append_null(),
            (ColumnBuilder::Int64(b), Some(Cell::I64(v))) => b.append_value(v),
            (ColumnBuilder::Int64(b), None) => b.append_null(),
            (ColumnBuilder::UInt8(b), Some(Cell::U8(v))) => b.append_value(v),
            (ColumnBuilder::UInt8(b), None) => b.append_null(),
            (ColumnBuilder::UInt16(b), Some(Cell::U16(v))) => b.append_value(v),
            (ColumnBuilder::UInt16(b), None) => b.append_null(),
            (ColumnBuilder::UInt32(b), Some(Cell::U32(v))) => b.append_value(v),
            (ColumnBuilder::UInt32(b), None) => b.append_null(),
            (ColumnBuilder::UInt64(b), Some(Cell::U64(v))) => b.append_value(v),
            (ColumnBuilder::UInt64(b), None) => b.append_null(),
            (ColumnBuilder::Float32(b), Some(Cell::F32(v))) => b.append_value(v),
            (ColumnBuilder::Float32(b), None) => b.append_null(),
            (ColumnBuilder::Float64(b), Some(Cell::F64(v))) => b.append_value(v),
            (ColumnBuilder::Float64(b), None) => b.append_null(),
            (ColumnBuilder::Decimal(b), Some(Cell::Decimal(v))) => b.append_value(v),
            (ColumnBuilder::Decimal(b), None) => b.append_null(),
            (ColumnBuilder::Date(b), Some(Cell::Date(v))) => b.append_value(v as i32),
            (ColumnBuilder::Date(b), None) => b.append_null(),
            (ColumnBuilder::Timestamp(b), Some(Cell::DateTime(v))) => b.append_value(v as i64),
            (ColumnBuilder::Timestamp(b), None) => b.append_null(),
            (ColumnBuilder::Uuid(b), Some(Cell::Uuid(v))) => b.append_value(v.as_bytes())?,
            (ColumnBuilder::Uuid(b), None) => b.append_null(),
            (ColumnBuilder::Utf8(b), Some(Cell::Str(v))) => b.append_value(v),
            (ColumnBuilder::Utf8(b), None) => b.append_null(),
            (ColumnBuilder::Binary(b), Some(Cell::Bytes(v))) => b.append_value(v),
            (ColumnBuilder::Binary(b), None) => b.append_null(),
            (_, Some(cell)) => {
                return Err(SinkError::TypeMismatch {
                    column,
                    got: cell.name(),
                });
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int8(b) => Arc::new(b.finish()),
            ColumnBuilder::Int16(b) => Arc::new(b.finish()),
            ColumnBuilder::Int32(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt8(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt16(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt32(b) => Arc::new(b.finish()),
            ColumnBuilder::UInt64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float32(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::Decimal(b) => Arc::new(b.finish()),
            ColumnBuilder::Date(b) => Arc::new(b.finish()),
            ColumnBuilder::Timestamp(b) => Arc::new(b.finish()),
            ColumnBuilder::Uuid(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
            ColumnBuilder::Binary(b) => Arc::new(b.finish()),
        }
    }
}

/// Arrow data type for a column declaration.
fn arrow_type(ty: &ColumnType) -> Result<DataType, SinkError> {
    Ok(match ty {
        ColumnType::Int8 | ColumnType::Enum8(_) => DataType::Int8,
        ColumnType::Int16 | ColumnType::Enum16(_) => DataType::Int16,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::UInt8 => DataType::UInt8,
        ColumnType::UInt16 => DataType::UInt16,
        ColumnType::UInt32 => DataType::UInt32,
        ColumnType::UInt64 => DataType::UInt64,
        ColumnType::UInt128 => return Err(SinkError::Unsupported("UInt128")),
        ColumnType::Float32 => DataType::Float32,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Decimal32 { precision, scale }
        | ColumnType::Decimal64 { precision, scale }
        | ColumnType::Decimal128 { precision, scale } => {
            DataType::Decimal128(*precision as u8, *scale as i8)
        }
        ColumnType::Date => DataType::Date32,
        ColumnType::DateTime => DataType::Timestamp(TimeUnit::Second, None),
        ColumnType::Uuid => DataType::FixedSizeBinary(16),
        ColumnType::String => DataType::Utf8,
        ColumnType::Bytes | ColumnType::Opaque => DataType::Binary,
    })
}

/// Collects decoded rows into Arrow record batches.
pub struct ArrowColumnSink {
    schema: Arc<Schema>,
    builders: Vec<ColumnBuilder>,
    pending: Vec<Option<Cell>>,
    rows: usize,
}

impl ArrowColumnSink {
    pub fn new(columns: &[Column]) -> Result<Self, SinkError> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Ok(Field::new(c.name.as_str(), arrow_type(&c.ty)?, true)))
            .collect::<Result<_, SinkError>>()?;
        let builders = columns
            .iter()
            .map(|c| ColumnBuilder::new(&c.ty))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            schema: Arc::new(Schema::new(fields)),
            builders,
            pending: columns.iter().map(|_| None).collect(),
            rows: 0,
        })
    }

    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Rows accumulated since the last batch.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Take the accumulated rows as a record batch, resetting the sink.
    pub fn finish_batch(&mut self) -> Result<RecordBatch, SinkError> {
        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(|b| b.finish()).collect();
        self.rows = 0;
        Ok(RecordBatch::try_new(Arc::clone(&self.schema), arrays)?)
    }

    fn set(&mut self, column: usize, cell: Cell) -> Result<(), SinkError> {
        let slot = self
            .pending
            .get_mut(column)
            .ok_or(SinkError::ColumnOutOfRange(column))?;
        *slot = Some(cell);
        Ok(())
    }
}

impl ColumnSink for ArrowColumnSink {
    type Error = SinkError;

    fn push_i8(&mut self, column: usize, value: i8) -> Result<(), Self::Error> {
        self.set(column, Cell::I8(value))
    }

    fn push_i16(&mut self, column: usize, value: i16) -> Result<(), Self::Error> {
        self.set(column, Cell::I16(value))
    }

    fn push_i32(&mut self, column: usize, value: i32) -> Result<(), Self::Error> {
        self.set(column, Cell::I32(value))
    }

    fn push_i64(&mut self, column: usize, value: i64) -> Result<(), Self::Error> {
        self.set(column, Cell::I64(value))
    }

    fn push_u8(&mut self, column: usize, value: u8) -> Result<(), Self::Error> {
        self.set(column, Cell::U8(value))
    }

    fn push_u16(&mut self, column: usize, value: u16) -> Result<(), Self::Error> {
        self.set(column, Cell::U16(value))
    }

    fn push_u32(&mut self, column: usize, value: u32) -> Result<(), Self::Error> {
        self.set(column, Cell::U32(value))
    }

    fn push_u64(&mut self, column: usize, value: u64) -> Result<(), Self::Error> {
        self.set(column, Cell::U64(value))
    }

    fn push_u128(&mut self, _column: usize, _value: u128) -> Result<(), Self::Error> {
        Err(SinkError::Unsupported("UInt128"))
    }

    fn push_f32(&mut self, column: usize, value: f32) -> Result<(), Self::Error> {
        self.set(column, Cell::F32(value))
    }

    fn push_f64(&mut self, column: usize, value: f64) -> Result<(), Self::Error> {
        self.set(column, Cell::F64(value))
    }

    fn push_decimal32(&mut self, column: usize, value: i32) -> Result<(), Self::Error> {
        self.set(column, Cell::Decimal(value as i128))
    }

    fn push_decimal64(&mut self, column: usize, value: i64) -> Result<(), Self::Error> {
        self.set(column, Cell::Decimal(value as i128))
    }

    fn push_decimal128(&mut self, column: usize, value: i128) -> Result<(), Self::Error> {
        self.set(column, Cell::Decimal(value))
    }

    fn push_date(&mut self, column: usize, days: u16) -> Result<(), Self::Error> {
        self.set(column, Cell::Date(days))
    }

    fn push_date_time(&mut self, column: usize, seconds: u32) -> Result<(), Self::Error> {
        self.set(column, Cell::DateTime(seconds))
    }

    fn push_uuid(&mut self, column: usize, value: Uuid) -> Result<(), Self::Error> {
        self.set(column, Cell::Uuid(value))
    }

    fn push_str(&mut self, column: usize, value: &str) -> Result<(), Self::Error> {
        self.set(column, Cell::Str(value.to_string()))
    }

    fn push_bytes(&mut self, column: usize, value: &[u8]) -> Result<(), Self::Error> {
        self.set(column, Cell::Bytes(value.to_vec()))
    }

    fn finish_row(&mut self) -> Result<(), Self::Error> {
        for (column, (builder, cell)) in self
            .builders
            .iter_mut()
            .zip(self.pending.iter_mut())
            .enumerate()
        {
            builder.append(column, cell.take())?;
        }
        self.rows += 1;
        Ok(())
    }
}
