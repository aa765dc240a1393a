//! Row-level protobuf reading.
//!
//! [`RowReader`] drives the wire scanner through one message per row,
//! mapping wire field numbers to output columns through the matched schema
//! tree and coercing each value with the field's converter. Fields absent
//! from the schema are skipped; nested messages are entered only when some
//! column lives inside them.

use prost_reflect::MessageDescriptor;
use thiserror::Error;

use crate::convert::{value_error, ConvertError};
use crate::schema::{BindingKind, Column, ColumnType, MessageTree, SchemaError};
use crate::sink::ColumnSink;
use crate::wire::{ByteSource, ScanError, WireScanner};

/// Errors surfaced by the row reader.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("no field is currently selected")]
    NoCurrentField,
}

/// Helper to convert sink errors to ReadError.
#[inline]
fn sink_err<E: std::fmt::Display>(e: E) -> ReadError {
    ReadError::Sink(e.to_string())
}

/// Streaming reader projecting protobuf messages into typed columns.
///
/// One instance per stream; the schema tree is built once at construction.
/// Rows are decoded either wholesale with [`read_row`](Self::read_row) or
/// manually with [`start_message`](Self::start_message) /
/// [`read_column_index`](Self::read_column_index) /
/// [`convert_current_into`](Self::convert_current_into) /
/// [`end_message`](Self::end_message).
pub struct RowReader<S> {
    scanner: WireScanner<S>,
    tree: MessageTree,
    column_types: Vec<ColumnType>,
    current_node: usize,
    current_field_index: usize,
    current_leaf: Option<(usize, usize)>,
}

impl<S: ByteSource> RowReader<S> {
    pub fn new(
        source: S,
        message: &MessageDescriptor,
        columns: &[Column],
    ) -> Result<Self, SchemaError> {
        let tree = MessageTree::build(message, columns)?;
        Ok(Self {
            scanner: WireScanner::new(source),
            tree,
            column_types: columns.iter().map(|c| c.ty.clone()).collect(),
            current_node: 0,
            current_field_index: 0,
            current_leaf: None,
        })
    }

    /// Begin the next row. Returns `false` on a clean end of stream.
    pub fn start_message(&mut self) -> Result<bool, ScanError> {
        if !self.scanner.start_message()? {
            return Ok(false);
        }
        self.current_node = 0;
        self.current_field_index = 0;
        self.current_leaf = None;
        Ok(true)
    }

    /// Finish the row, abandoning any partially consumed nesting.
    pub fn end_message(&mut self) -> Result<(), ScanError> {
        self.current_leaf = None;
        self.scanner.end_root_message()
    }

    /// Advance to the next schema-bound field, descending into and popping
    /// out of nested messages as the wire dictates. Returns the column
    /// index of the field now selected, or `None` when the row is done.
    pub fn read_column_index(&mut self) -> Result<Option<usize>, ReadError> {
        loop {
            let Some(field_number) = self.scanner.read_field_number()? else {
                let node = self.tree.node(self.current_node);
                let Some(parent) = node.parent else {
                    self.current_leaf = None;
                    return Ok(None);
                };
                let index_in_parent = node.index_in_parent;
                self.scanner.end_message()?;
                self.current_field_index = index_in_parent;
                self.current_node = parent;
                continue;
            };

            // Optimistic linear advance for producers emitting fields in
            // ascending tag order, with a map fallback for the rest.
            let mut found: Option<usize> = None;
            loop {
                let fields = &self.tree.node(self.current_node).fields;
                let Some(binding) = fields.get(self.current_field_index) else {
                    break;
                };
                if binding.field_number == field_number {
                    found = Some(self.current_field_index);
                    break;
                }
                if binding.field_number > field_number {
                    break;
                }
                self.current_field_index += 1;
            }
            let found = found.or_else(|| {
                self.tree
                    .node(self.current_node)
                    .by_number
                    .get(&field_number)
                    .copied()
            });

            // Unknown field: the scanner disposes of its payload on the
            // next header read.
            let Some(pos) = found else {
                continue;
            };

            match &self.tree.node(self.current_node).fields[pos].kind {
                BindingKind::Nested { node } => {
                    let node = *node;
                    self.scanner.start_message()?;
                    self.current_node = node;
                    self.current_field_index = 0;
                }
                BindingKind::Leaf { column_index, .. } => {
                    let column_index = *column_index;
                    self.current_leaf = Some((self.current_node, pos));
                    return Ok(Some(column_index));
                }
            }
        }
    }

    /// Coerce the currently selected field into the sink according to the
    /// column's declared type. A packed length-delimited payload emits one
    /// value per element; scalar fields emit exactly one.
    pub fn convert_current_into<K: ColumnSink>(
        &mut self,
        column_index: usize,
        sink: &mut K,
    ) -> Result<(), ReadError>
    where
        K::Error: std::fmt::Display,
    {
        let Some((node, pos)) = self.current_leaf else {
            return Err(ReadError::NoCurrentField);
        };
        let BindingKind::Leaf { converter, .. } = &mut self.tree.nodes[node].fields[pos].kind
        else {
            return Err(ReadError::NoCurrentField);
        };
        let scanner = &mut self.scanner;

        match &self.column_types[column_index] {
            ColumnType::Int8 => {
                while let Some(v) = converter.read_i8(scanner)? {
                    sink.push_i8(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Int16 => {
                while let Some(v) = converter.read_i16(scanner)? {
                    sink.push_i16(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Int32 => {
                while let Some(v) = converter.read_i32(scanner)? {
                    sink.push_i32(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Int64 => {
                while let Some(v) = converter.read_i64(scanner)? {
                    sink.push_i64(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::UInt8 => {
                while let Some(v) = converter.read_u8(scanner)? {
                    sink.push_u8(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::UInt16 => {
                while let Some(v) = converter.read_u16(scanner)? {
                    sink.push_u16(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::UInt32 => {
                while let Some(v) = converter.read_u32(scanner)? {
                    sink.push_u32(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::UInt64 => {
                while let Some(v) = converter.read_u64(scanner)? {
                    sink.push_u64(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::UInt128 => {
                while let Some(v) = converter.read_u128(scanner)? {
                    sink.push_u128(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Float32 => {
                while let Some(v) = converter.read_f32(scanner)? {
                    sink.push_f32(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Float64 => {
                while let Some(v) = converter.read_f64(scanner)? {
                    sink.push_f64(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Decimal32 { precision, scale } => {
                while let Some(v) = converter.read_decimal32(scanner, *precision, *scale)? {
                    sink.push_decimal32(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Decimal64 { precision, scale } => {
                while let Some(v) = converter.read_decimal64(scanner, *precision, *scale)? {
                    sink.push_decimal64(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Decimal128 { precision, scale } => {
                while let Some(v) = converter.read_decimal128(scanner, *precision, *scale)? {
                    sink.push_decimal128(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Date => {
                while let Some(v) = converter.read_date(scanner)? {
                    sink.push_date(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::DateTime => {
                while let Some(v) = converter.read_date_time(scanner)? {
                    sink.push_date_time(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Uuid => {
                while let Some(v) = converter.read_uuid(scanner)? {
                    sink.push_uuid(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Enum8(pairs) => {
                converter.prepare_enum_mapping8(pairs);
                while let Some(v) = converter.read_enum8(scanner)? {
                    sink.push_i8(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::Enum16(pairs) => {
                converter.prepare_enum_mapping16(pairs);
                while let Some(v) = converter.read_enum16(scanner)? {
                    sink.push_i16(column_index, v).map_err(sink_err)?;
                }
            }
            ColumnType::String => {
                let mut buf = Vec::new();
                if converter.read_string_into(scanner, &mut buf)? {
                    let text = std::str::from_utf8(&buf).map_err(|_| {
                        value_error(
                            converter.field(),
                            String::from_utf8_lossy(&buf).into_owned(),
                            "String",
                        )
                    })?;
                    sink.push_str(column_index, text).map_err(sink_err)?;
                }
            }
            ColumnType::Bytes => {
                let mut buf = Vec::new();
                if converter.read_string_into(scanner, &mut buf)? {
                    sink.push_bytes(column_index, &buf).map_err(sink_err)?;
                }
            }
            ColumnType::Opaque => {
                if let Some(bytes) = converter.read_opaque_with(scanner, |b| Ok(b.to_vec()))? {
                    sink.push_bytes(column_index, &bytes).map_err(sink_err)?;
                }
            }
        }
        Ok(())
    }

    /// Decode one whole row into the sink. Returns `false` on a clean end
    /// of stream. Any error abandons the row without a partial emission
    /// for the failing column.
    pub fn read_row<K: ColumnSink>(&mut self, sink: &mut K) -> Result<bool, ReadError>
    where
        K::Error: std::fmt::Display,
    {
        if !self.start_message()? {
            return Ok(false);
        }
        while let Some(column_index) = self.read_column_index()? {
            self.convert_current_into(column_index, sink)?;
        }
        self.end_message()?;
        sink.finish_row().map_err(sink_err)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        build_pool, enum_field, framed, len_field, message, message_field, scalar_field,
        simple_enum, tag, varint, Recorded, RecordingSink,
    };
    use crate::wire::SliceSource;
    use prost_reflect::MessageDescriptor;
    use prost_types::field_descriptor_proto::Type;

    fn single_field_message(ty: Type) -> MessageDescriptor {
        let pool = build_pool(vec![message("M", vec![scalar_field("a", 1, ty)])], vec![]);
        pool.get_message_by_name("test.M").unwrap()
    }

    fn decode_all(
        desc: &MessageDescriptor,
        columns: &[Column],
        data: &[u8],
    ) -> Result<Vec<Vec<(usize, Recorded)>>, ReadError> {
        let mut reader = RowReader::new(SliceSource::new(data), desc, columns)?;
        let mut sink = RecordingSink::new();
        while reader.read_row(&mut sink)? {}
        Ok(sink.rows)
    }

    mod scenarios {
        use super::*;

        #[test]
        fn test_int32_field() {
            let desc = single_field_message(Type::Int32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            // 02 08 2A
            let data = framed(&[&tag(1, 0)[..], &varint(42)].concat());
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::I32(42))]]);
        }

        #[test]
        fn test_string_field_to_int32() {
            let desc = single_field_message(Type::String);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            // 06 0A 04 31 32 33 34
            let data = framed(&len_field(1, b"1234"));
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::I32(1234))]]);
        }

        #[test]
        fn test_sint32_zigzag() {
            let desc = single_field_message(Type::Sint32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            // 03 08 03
            let data = framed(&[&tag(1, 0)[..], &varint(3)].concat());
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::I32(-2))]]);
        }

        #[test]
        fn test_unknown_field_is_skipped() {
            let pool = build_pool(
                vec![message("M", vec![scalar_field("b", 2, Type::Bool)])],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![Column::new("b", ColumnType::UInt8)];
            // field 1 (not in schema) varint 1, then field 2 bool true
            let body = [&tag(1, 0)[..], &varint(1), &tag(2, 0), &varint(1)].concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::U8(1))]]);
        }

        #[test]
        fn test_nested_fixed32() {
            let pool = build_pool(
                vec![
                    message("M", vec![message_field("sub", 3, "Sub")]),
                    message("Sub", vec![scalar_field("x", 1, Type::Fixed32)]),
                ],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![Column::new("sub.x", ColumnType::UInt32)];
            let inner = [&tag(1, 5)[..], &0x12345678u32.to_le_bytes()].concat();
            let data = framed(&len_field(3, &inner));
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::U32(0x12345678))]]);
        }

        #[test]
        fn test_two_messages_two_rows() {
            let desc = single_field_message(Type::Int32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            // 02 08 01 02 08 02
            let mut data = framed(&[&tag(1, 0)[..], &varint(1)].concat());
            data.extend(framed(&[&tag(1, 0)[..], &varint(2)].concat()));
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(
                rows,
                vec![
                    vec![(0, Recorded::I32(1))],
                    vec![(0, Recorded::I32(2))],
                ]
            );
        }

        #[test]
        fn test_enum_to_string() {
            let pool = build_pool(
                vec![message("M", vec![enum_field("color", 1, "Color")])],
                vec![simple_enum("Color", &[("RED", 5), ("BLUE", 6)])],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![Column::new("color", ColumnType::String)];
            let data = framed(&[&tag(1, 0)[..], &varint(5)].concat());
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::Str("RED".to_string()))]]);
        }

        #[test]
        fn test_enum_to_enum8_mapping() {
            let pool = build_pool(
                vec![message("M", vec![enum_field("color", 1, "Color")])],
                vec![simple_enum("Color", &[("RED", 5), ("BLUE", 6)])],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![Column::new(
                "color",
                ColumnType::Enum8(vec![("RED".to_string(), 1)]),
            )];
            let data = framed(&[&tag(1, 0)[..], &varint(5)].concat());
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::I8(1))]]);
        }

        #[test]
        fn test_enum_number_outside_mapping_is_bad_cast() {
            let pool = build_pool(
                vec![message("M", vec![enum_field("color", 1, "Color")])],
                vec![simple_enum("Color", &[("RED", 5)])],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![Column::new(
                "color",
                ColumnType::Enum8(vec![("RED".to_string(), 1)]),
            )];
            let data = framed(&[&tag(1, 0)[..], &varint(99)].concat());
            let err = decode_all(&desc, &columns, &data).unwrap_err();
            assert!(matches!(
                err,
                ReadError::Convert(ConvertError::Value { .. })
            ));
        }
    }

    mod casts {
        use super::*;

        #[test]
        fn test_uint64_300_to_uint8_is_bad_cast() {
            let desc = single_field_message(Type::Uint64);
            let columns = vec![Column::new("a", ColumnType::UInt8)];
            let data = framed(&[&tag(1, 0)[..], &varint(300)].concat());
            let err = decode_all(&desc, &columns, &data).unwrap_err();
            match err {
                ReadError::Convert(ConvertError::Value {
                    value,
                    field,
                    target,
                }) => {
                    assert_eq!(value, "300");
                    assert_eq!(field, "a");
                    assert_eq!(target, "UInt8");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn test_uuid_from_number_is_unsupported() {
            let desc = single_field_message(Type::Uint64);
            let columns = vec![Column::new("a", ColumnType::Uuid)];
            let data = framed(&[&tag(1, 0)[..], &varint(1)].concat());
            let err = decode_all(&desc, &columns, &data).unwrap_err();
            match err {
                ReadError::Convert(ConvertError::Type { wire, target, .. }) => {
                    assert_eq!(wire, "uint64");
                    assert_eq!(target, "UUID");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn test_number_rendered_as_string() {
            let desc = single_field_message(Type::Double);
            let columns = vec![Column::new("a", ColumnType::String)];
            let data = framed(&[&tag(1, 1)[..], &2.5f64.to_le_bytes()].concat());
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::Str("2.5".to_string()))]]);
        }

        #[test]
        fn test_bool_renders_and_counts() {
            let desc = single_field_message(Type::Bool);
            let data = framed(&[&tag(1, 0)[..], &varint(1)].concat());

            let columns = vec![Column::new("a", ColumnType::String)];
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::Str("true".to_string()))]]);

            let columns = vec![Column::new("a", ColumnType::Int32)];
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![(0, Recorded::I32(1))]]);
        }

        #[test]
        fn test_string_to_date_and_uuid() {
            let pool = build_pool(
                vec![message(
                    "M",
                    vec![
                        scalar_field("d", 1, Type::String),
                        scalar_field("u", 2, Type::String),
                    ],
                )],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![
                Column::new("d", ColumnType::Date),
                Column::new("u", ColumnType::Uuid),
            ];
            let uuid = "67e55044-10b1-426f-9247-bb680e5fe0c8";
            let body = [
                len_field(1, b"1970-02-01"),
                len_field(2, uuid.as_bytes()),
            ]
            .concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0][0], (0, Recorded::Date(31)));
            assert_eq!(
                rows[0][1],
                (1, Recorded::Uuid(uuid.parse().unwrap()))
            );
        }

        #[test]
        fn test_decimal_from_string_and_number() {
            let pool = build_pool(
                vec![message(
                    "M",
                    vec![
                        scalar_field("s", 1, Type::String),
                        scalar_field("n", 2, Type::Int32),
                    ],
                )],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![
                Column::new(
                    "s",
                    ColumnType::Decimal64 {
                        precision: 18,
                        scale: 2,
                    },
                ),
                Column::new(
                    "n",
                    ColumnType::Decimal32 {
                        precision: 9,
                        scale: 3,
                    },
                ),
            ];
            let body = [
                &len_field(1, b"123.45")[..],
                &tag(2, 0),
                &varint(7),
            ]
            .concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows[0][0], (0, Recorded::Dec64(12345)));
            assert_eq!(rows[0][1], (1, Recorded::Dec32(7000)));
        }
    }

    mod dispatch {
        use super::*;

        #[test]
        fn test_repeated_field_emits_each_occurrence() {
            let desc = single_field_message(Type::Int32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            let body = [
                &tag(1, 0)[..],
                &varint(1),
                &tag(1, 0),
                &varint(2),
                &tag(1, 0),
                &varint(3),
            ]
            .concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(
                rows,
                vec![vec![
                    (0, Recorded::I32(1)),
                    (0, Recorded::I32(2)),
                    (0, Recorded::I32(3)),
                ]]
            );
        }

        #[test]
        fn test_out_of_order_fields_use_map_fallback() {
            let pool = build_pool(
                vec![message(
                    "M",
                    vec![
                        scalar_field("a", 1, Type::Int32),
                        scalar_field("b", 2, Type::Int32),
                        scalar_field("c", 3, Type::Int32),
                    ],
                )],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![
                Column::new("a", ColumnType::Int32),
                Column::new("b", ColumnType::Int32),
                Column::new("c", ColumnType::Int32),
            ];
            // emitted as 3, 1, 2
            let body = [
                &tag(3, 0)[..],
                &varint(30),
                &tag(1, 0),
                &varint(10),
                &tag(2, 0),
                &varint(20),
            ]
            .concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(
                rows,
                vec![vec![
                    (2, Recorded::I32(30)),
                    (0, Recorded::I32(10)),
                    (1, Recorded::I32(20)),
                ]]
            );
        }

        #[test]
        fn test_unselected_sibling_after_nested_message() {
            let pool = build_pool(
                vec![
                    message(
                        "M",
                        vec![
                            message_field("sub", 1, "Sub"),
                            scalar_field("tail", 2, Type::Int32),
                        ],
                    ),
                    message("Sub", vec![scalar_field("x", 1, Type::Int32)]),
                ],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![
                Column::new("sub.x", ColumnType::Int32),
                Column::new("tail", ColumnType::Int32),
            ];
            let inner = [&tag(1, 0)[..], &varint(5)].concat();
            let body = [&len_field(1, &inner)[..], &tag(2, 0), &varint(6)].concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(
                rows,
                vec![vec![(0, Recorded::I32(5)), (1, Recorded::I32(6))]]
            );
        }

        #[test]
        fn test_empty_message_yields_empty_row() {
            let desc = single_field_message(Type::Int32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            let data = framed(&[]);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(rows, vec![vec![]]);
        }

        #[test]
        fn test_every_numeric_wire_type_roundtrips() {
            let pool = build_pool(
                vec![message(
                    "M",
                    vec![
                        scalar_field("a", 1, Type::Int32),
                        scalar_field("b", 2, Type::Sint32),
                        scalar_field("c", 3, Type::Uint32),
                        scalar_field("d", 4, Type::Int64),
                        scalar_field("e", 5, Type::Sint64),
                        scalar_field("f", 6, Type::Uint64),
                        scalar_field("g", 7, Type::Fixed32),
                        scalar_field("h", 8, Type::Sfixed32),
                        scalar_field("i", 9, Type::Fixed64),
                        scalar_field("j", 10, Type::Sfixed64),
                        scalar_field("k", 11, Type::Float),
                        scalar_field("l", 12, Type::Double),
                    ],
                )],
                vec![],
            );
            let desc = pool.get_message_by_name("test.M").unwrap();
            let columns = vec![
                Column::new("a", ColumnType::Int32),
                Column::new("b", ColumnType::Int32),
                Column::new("c", ColumnType::UInt32),
                Column::new("d", ColumnType::Int64),
                Column::new("e", ColumnType::Int64),
                Column::new("f", ColumnType::UInt64),
                Column::new("g", ColumnType::UInt32),
                Column::new("h", ColumnType::Int32),
                Column::new("i", ColumnType::UInt64),
                Column::new("j", ColumnType::Int64),
                Column::new("k", ColumnType::Float32),
                Column::new("l", ColumnType::Float64),
            ];
            let body = [
                &tag(1, 0)[..],
                &varint(-5i64 as u64),
                &tag(2, 0),
                &varint(11), // zigzag(-6)
                &tag(3, 0),
                &varint(7),
                &tag(4, 0),
                &varint(-8i64 as u64),
                &tag(5, 0),
                &varint(18), // zigzag(9)
                &tag(6, 0),
                &varint(10),
                &tag(7, 5),
                &11u32.to_le_bytes(),
                &tag(8, 5),
                &(-12i32).to_le_bytes(),
                &tag(9, 1),
                &13u64.to_le_bytes(),
                &tag(10, 1),
                &(-14i64).to_le_bytes(),
                &tag(11, 5),
                &1.5f32.to_le_bytes(),
                &tag(12, 1),
                &(-2.5f64).to_le_bytes(),
            ]
            .concat();
            let data = framed(&body);
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(
                rows,
                vec![vec![
                    (0, Recorded::I32(-5)),
                    (1, Recorded::I32(-6)),
                    (2, Recorded::U32(7)),
                    (3, Recorded::I64(-8)),
                    (4, Recorded::I64(9)),
                    (5, Recorded::U64(10)),
                    (6, Recorded::U32(11)),
                    (7, Recorded::I32(-12)),
                    (8, Recorded::U64(13)),
                    (9, Recorded::I64(-14)),
                    (10, Recorded::F32(1.5)),
                    (11, Recorded::F64(-2.5)),
                ]]
            );
        }

        #[test]
        fn test_decode_through_stream_source() {
            use crate::wire::StreamSource;

            let desc = single_field_message(Type::Int32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            let mut data = Vec::new();
            for v in 0..100u64 {
                data.extend(framed(&[&tag(1, 0)[..], &varint(v)].concat()));
            }
            let source = StreamSource::new(std::io::Cursor::new(data));
            let mut reader = RowReader::new(source, &desc, &columns).unwrap();
            let mut sink = RecordingSink::new();
            while reader.read_row(&mut sink).unwrap() {}
            assert_eq!(sink.rows.len(), 100);
            assert_eq!(sink.rows[99], vec![(0, Recorded::I32(99))]);
        }

        #[test]
        fn test_packed_payload_emits_every_element() {
            let desc = single_field_message(Type::Int32);
            let columns = vec![Column::new("a", ColumnType::Int32)];
            let payload = [varint(4), varint(5), varint(6)].concat();
            let data = framed(&len_field(1, &payload));
            let rows = decode_all(&desc, &columns, &data).unwrap();
            assert_eq!(
                rows,
                vec![vec![
                    (0, Recorded::I32(4)),
                    (0, Recorded::I32(5)),
                    (0, Recorded::I32(6)),
                ]]
            );
        }
    }
}
