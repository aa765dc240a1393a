//! Streaming protobuf-to-columns decoder.
//!
//! Decodes a length-delimited stream of protobuf messages in a single
//! forward pass, projecting selected fields of each message into typed
//! output columns without materializing the parsed message tree. Built in
//! three layers: the wire scanner (`wire`), the per-field value converters
//! (`convert`), and the schema matcher plus row dispatcher (`schema`,
//! `reader`). `arrow` provides a column sink producing record batches.

pub mod arrow;
pub mod convert;
pub mod reader;
pub mod schema;
pub mod sink;
pub mod wire;

#[cfg(test)]
pub(crate) mod testutil;

pub use reader::{ReadError, RowReader};
pub use schema::{default_column_type, Column, ColumnType, SchemaError};
pub use sink::ColumnSink;
