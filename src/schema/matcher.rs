//! Matching output columns against a message descriptor.
//!
//! Produces the dispatch tree used at decode time: one node per (sub)message
//! holding its bound fields sorted by field number, each leaf carrying a
//! column index and a converter chosen from the field's protobuf type. The
//! tree is an arena of nodes linked by index so ownership stays strictly
//! downward.

use std::collections::HashMap;

use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use thiserror::Error;

use crate::convert::Converter;
use crate::schema::Column;

/// Errors raised while matching columns to the descriptor.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("message type '{0}' has no fields matching the requested columns")]
    NoColumnsMatched(String),

    #[error("column '{column}' traverses field '{field}', which is not a message")]
    NotAMessage { column: String, field: String },

    #[error("column '{column}' names message field '{field}' without selecting a field inside it")]
    CompositeColumn { column: String, field: String },

    #[error("column '{0}' is bound more than once")]
    DuplicateColumn(String),
}

/// A bound field within a node: either a value-producing leaf or a
/// container descending into a child node.
pub(crate) enum BindingKind {
    Leaf {
        column_index: usize,
        converter: Converter,
    },
    Nested {
        node: usize,
    },
}

pub(crate) struct FieldBinding {
    pub(crate) field_number: u32,
    pub(crate) kind: BindingKind,
}

/// One message level of the dispatch tree.
pub(crate) struct MessageNode {
    pub(crate) parent: Option<usize>,
    /// Position of this node's container field within the parent's sorted
    /// field list.
    pub(crate) index_in_parent: usize,
    /// Bound fields, strictly sorted by field number.
    pub(crate) fields: Vec<FieldBinding>,
    /// Fallback lookup for producers that emit fields out of order.
    pub(crate) by_number: HashMap<u32, usize>,
}

/// The dispatch tree. Node 0 is the root message.
pub struct MessageTree {
    pub(crate) nodes: Vec<MessageNode>,
}

impl MessageTree {
    /// Match `columns` against `message`, building the tree.
    ///
    /// Unknown column names stay unbound (their columns are simply never
    /// emitted); it is an error only if nothing matches at all.
    pub fn build(message: &MessageDescriptor, columns: &[Column]) -> Result<Self, SchemaError> {
        let mut tree = MessageTree {
            nodes: vec![MessageNode {
                parent: None,
                index_in_parent: 0,
                fields: Vec::new(),
                by_number: HashMap::new(),
            }],
        };
        let mut bound = 0usize;

        for (column_index, column) in columns.iter().enumerate() {
            let Some(path) = resolve_path(message, column)? else {
                continue;
            };
            tree.bind(column, column_index, &path)?;
            bound += 1;
        }

        if bound == 0 {
            return Err(SchemaError::NoColumnsMatched(message.full_name().to_string()));
        }

        tree.finalize();
        Ok(tree)
    }

    pub(crate) fn node(&self, index: usize) -> &MessageNode {
        &self.nodes[index]
    }

    /// Add one resolved column path, creating nested nodes as needed.
    fn bind(
        &mut self,
        column: &Column,
        column_index: usize,
        path: &[FieldDescriptor],
    ) -> Result<(), SchemaError> {
        let mut node = 0usize;
        for field in &path[..path.len() - 1] {
            node = self.nested_child(node, field);
        }

        let leaf = &path[path.len() - 1];
        let fields = &mut self.nodes[node].fields;
        if fields.iter().any(|f| f.field_number == leaf.number()) {
            return Err(SchemaError::DuplicateColumn(column.name.clone()));
        }
        let converter =
            Converter::from_field(leaf).ok_or_else(|| SchemaError::CompositeColumn {
                column: column.name.clone(),
                field: leaf.name().to_string(),
            })?;
        fields.push(FieldBinding {
            field_number: leaf.number(),
            kind: BindingKind::Leaf {
                column_index,
                converter,
            },
        });
        Ok(())
    }

    /// Find or create the child node for a container field.
    fn nested_child(&mut self, node: usize, field: &FieldDescriptor) -> usize {
        let existing = self.nodes[node].fields.iter().find_map(|f| {
            if f.field_number != field.number() {
                return None;
            }
            match &f.kind {
                BindingKind::Nested { node } => Some(*node),
                BindingKind::Leaf { .. } => None,
            }
        });
        if let Some(child) = existing {
            return child;
        }

        let child = self.nodes.len();
        self.nodes.push(MessageNode {
            parent: Some(node),
            index_in_parent: 0,
            fields: Vec::new(),
            by_number: HashMap::new(),
        });
        self.nodes[node].fields.push(FieldBinding {
            field_number: field.number(),
            kind: BindingKind::Nested { node: child },
        });
        child
    }

    /// Sort each node's fields by number, then rebuild the number lookup
    /// and every child's position within its parent.
    fn finalize(&mut self) {
        for index in 0..self.nodes.len() {
            self.nodes[index].fields.sort_by_key(|f| f.field_number);
            let positions: Vec<(u32, usize, Option<usize>)> = self.nodes[index]
                .fields
                .iter()
                .enumerate()
                .map(|(pos, f)| {
                    let child = match &f.kind {
                        BindingKind::Nested { node } => Some(*node),
                        BindingKind::Leaf { .. } => None,
                    };
                    (f.field_number, pos, child)
                })
                .collect();
            let by_number = positions.iter().map(|(n, pos, _)| (*n, *pos)).collect();
            self.nodes[index].by_number = by_number;
            for (_, pos, child) in positions {
                if let Some(child) = child {
                    self.nodes[child].index_in_parent = pos;
                }
            }
        }
    }
}

/// Resolve a dotted column name to the chain of descriptor fields it names.
/// `None` when some path segment does not exist.
fn resolve_path(
    message: &MessageDescriptor,
    column: &Column,
) -> Result<Option<Vec<FieldDescriptor>>, SchemaError> {
    let mut current = message.clone();
    let mut path = Vec::new();
    let segments: Vec<&str> = column.name.split('.').collect();
    for (depth, segment) in segments.iter().enumerate() {
        let Some(field) = current.get_field_by_name(segment) else {
            return Ok(None);
        };
        let last = depth + 1 == segments.len();
        if !last {
            match field.kind() {
                Kind::Message(inner) => current = inner,
                _ => {
                    return Err(SchemaError::NotAMessage {
                        column: column.name.clone(),
                        field: field.name().to_string(),
                    });
                }
            }
        }
        path.push(field);
    }
    Ok(Some(path))
}
