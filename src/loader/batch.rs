//! Binding a file's header to a table schema and coercing its records

use std::fmt;

use tracing::error;

use super::LoadError;
use crate::db::schema::TableSchema;
use crate::formats::normalize::{self, CoerceError, KeyPart, Value};
use crate::formats::{Record, RecordSet};

/// Primary-key values of one row, in key order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(pub Vec<KeyPart>);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// How the columns of an input file line up with a table schema
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    /// Schema column indices present in the header, in schema order
    pub columns: Vec<usize>,
    /// Header position of each entry in `columns`
    header_positions: Vec<usize>,
    /// Index into `columns` of each primary-key column, in key order
    pub key_slots: Vec<usize>,
    header_len: usize,
}

impl ColumnLayout {
    /// Match header names against the schema
    ///
    /// Blank header names are ignored. Every primary-key column must be
    /// present; any other named column must belong to the schema.
    pub fn bind(schema: &TableSchema, header: &[String]) -> Result<Self, LoadError> {
        let mut by_schema: Vec<Option<usize>> = vec![None; schema.columns.len()];

        for (pos, name) in header.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let Some((col_idx, _)) = schema.column(name) else {
                return Err(LoadError::UnknownColumn {
                    table: schema.name.to_string(),
                    column: name.clone(),
                });
            };
            if by_schema[col_idx].replace(pos).is_some() {
                return Err(LoadError::DuplicateColumn {
                    table: schema.name.to_string(),
                    column: name.clone(),
                });
            }
        }

        let mut columns = Vec::new();
        let mut header_positions = Vec::new();
        for (col_idx, pos) in by_schema.iter().enumerate() {
            if let Some(pos) = pos {
                columns.push(col_idx);
                header_positions.push(*pos);
            }
        }

        let mut key_slots = Vec::with_capacity(schema.primary_key.len());
        for key in schema.primary_key {
            let slot = schema
                .column(key)
                .and_then(|(col_idx, _)| columns.iter().position(|c| *c == col_idx))
                .ok_or_else(|| LoadError::MissingKeyColumn {
                    table: schema.name.to_string(),
                    column: key.to_string(),
                })?;
            key_slots.push(slot);
        }

        Ok(Self {
            columns,
            header_positions,
            key_slots,
            header_len: header.len(),
        })
    }

    /// Slots in `columns` that are not part of the primary key
    pub fn value_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.columns.len()).filter(move |slot| !self.key_slots.contains(slot))
    }
}

/// A coerced input row ready for reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    /// 1-based position among the file's data rows
    pub position: usize,
    /// Values aligned with [`ColumnLayout::columns`]
    pub values: Vec<Value>,
    pub key: RowKey,
}

/// All rows of one input file, coerced against one table schema
#[derive(Debug)]
pub struct PreparedBatch<'s> {
    pub schema: &'s TableSchema,
    pub layout: ColumnLayout,
    pub rows: Vec<TypedRow>,
}

impl<'s> PreparedBatch<'s> {
    /// Bind the header and coerce every record, stopping at the first bad row
    pub fn prepare(schema: &'s TableSchema, set: &RecordSet) -> Result<Self, LoadError> {
        let layout = ColumnLayout::bind(schema, &set.header)?;

        let mut rows = Vec::with_capacity(set.records.len());
        for record in &set.records {
            match coerce_record(schema, &layout, record) {
                Ok(row) => rows.push(row),
                Err(source) => {
                    let content = describe_record(&set.header, &record.fields);
                    error!(
                        table = schema.name,
                        row = record.position,
                        line = record.line,
                        content = %content,
                        error = %source,
                        "row failed to process"
                    );
                    return Err(LoadError::Row {
                        table: schema.name.to_string(),
                        position: record.position,
                        line: record.line,
                        content,
                        source,
                    });
                }
            }
        }

        Ok(Self {
            schema,
            layout,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn coerce_record(
    schema: &TableSchema,
    layout: &ColumnLayout,
    record: &Record,
) -> Result<TypedRow, CoerceError> {
    if record.fields.len() > layout.header_len {
        return Err(CoerceError::TooManyFields {
            expected: layout.header_len,
            found: record.fields.len(),
        });
    }

    let values = layout
        .columns
        .iter()
        .zip(&layout.header_positions)
        .map(|(col_idx, pos)| {
            let raw = record.fields.get(*pos).map(String::as_str);
            normalize::coerce(raw, &schema.columns[*col_idx])
        })
        .collect::<Result<Vec<_>, _>>()?;

    let key = layout
        .key_slots
        .iter()
        .map(|slot| {
            values[*slot]
                .as_key_part()
                .ok_or_else(|| CoerceError::NullKey {
                    field: schema.columns[layout.columns[*slot]].name.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TypedRow {
        position: record.position,
        values,
        key: RowKey(key),
    })
}

/// Render a record as `name=value` pairs for diagnostics
pub fn describe_record(header: &[String], fields: &[String]) -> String {
    let pairs: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(idx, value)| match header.get(idx) {
            Some(name) if !name.is_empty() => format!("{}={:?}", name, value),
            _ => format!("#{}={:?}", idx + 1, value),
        })
        .collect();
    format!("{{{}}}", pairs.join(", "))
}
