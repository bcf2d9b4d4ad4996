//! SQL text for the keyed fetch and the batched write

use super::batch::ColumnLayout;
use crate::config::MAX_BIND_PARAMETERS;
use crate::db::schema::{FieldType, TableSchema, quote_ident};
use crate::db::session::Backend;

/// Number of keys probed by one keyed-fetch statement
pub fn keys_per_fetch(schema: &TableSchema) -> usize {
    (MAX_BIND_PARAMETERS / schema.primary_key.len().max(1)).max(1)
}

/// Number of records written by one upsert statement
pub fn records_per_write(layout: &ColumnLayout, batch_size: usize) -> usize {
    let by_params = MAX_BIND_PARAMETERS / layout.columns.len().max(1);
    batch_size.min(by_params).max(1)
}

/// Select the stored keys among `key_count` candidate keys
///
/// Key columns are cast to BIGINT or TEXT so both backends decode them the
/// same way.
pub fn select_existing_keys(schema: &TableSchema, backend: Backend, key_count: usize) -> String {
    let selected: Vec<String> = schema
        .key_columns()
        .map(|col| {
            let cast = match col.field_type {
                FieldType::Integer | FieldType::BigInt => "BIGINT",
                _ => "TEXT",
            };
            format!("CAST({} AS {})", quote_ident(col.name), cast)
        })
        .collect();

    let key_names: Vec<String> = schema.primary_key.iter().map(|k| quote_ident(k)).collect();
    let width = key_names.len();

    let mut param_idx = 0;
    let tuples: Vec<String> = (0..key_count)
        .map(|_| {
            let params: Vec<String> = (0..width)
                .map(|_| {
                    param_idx += 1;
                    backend.placeholder(param_idx)
                })
                .collect();
            if width == 1 {
                params.join("")
            } else {
                format!("({})", params.join(", "))
            }
        })
        .collect();

    let probe = if width == 1 {
        key_names.join("")
    } else {
        format!("({})", key_names.join(", "))
    };

    format!(
        "SELECT {} FROM {} WHERE {} IN ({})",
        selected.join(", "),
        quote_ident(schema.name),
        probe,
        tuples.join(", ")
    )
}

/// Insert `record_count` records, updating the present non-key columns of
/// any record whose key is already stored
pub fn upsert(
    schema: &TableSchema,
    layout: &ColumnLayout,
    backend: Backend,
    record_count: usize,
) -> String {
    let column_names: Vec<String> = layout
        .columns
        .iter()
        .map(|idx| quote_ident(schema.columns[*idx].name))
        .collect();

    let mut param_idx = 0;
    let rows: Vec<String> = (0..record_count)
        .map(|_| {
            let params: Vec<String> = (0..column_names.len())
                .map(|_| {
                    param_idx += 1;
                    backend.placeholder(param_idx)
                })
                .collect();
            format!("({})", params.join(", "))
        })
        .collect();

    let key_names: Vec<String> = schema.primary_key.iter().map(|k| quote_ident(k)).collect();
    let assignments: Vec<String> = layout
        .value_slots()
        .map(|slot| {
            let name = &column_names[slot];
            format!("{} = excluded.{}", name, name)
        })
        .collect();

    let conflict_action = if assignments.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", assignments.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) {}",
        quote_ident(schema.name),
        column_names.join(", "),
        rows.join(", "),
        key_names.join(", "),
        conflict_action
    )
}
