//! Reconciling loader: turns one parsed input file into one committed batch
//!
//! A file is bound to its table schema and coerced ([`PreparedBatch`]), the
//! keys it carries are looked up, each row is classified as insert or update
//! ([`plan`]), and the distinct records are written in a single transaction
//! ([`Reconciler`]).

pub mod batch;
pub mod plan;
pub mod reconciler;
pub mod statement;

use thiserror::Error;

use crate::formats::normalize::CoerceError;

pub use batch::{ColumnLayout, PreparedBatch, RowKey, TypedRow};
pub use plan::{ReconcilePlan, RowAction};
pub use reconciler::{BatchOutcome, Reconciler};

/// Errors that abort a batch
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{table}: row {position} (line {line}) failed: {source}; row content: {content}")]
    Row {
        table: String,
        position: usize,
        line: u64,
        content: String,
        #[source]
        source: CoerceError,
    },

    #[error("{table}: input header lacks primary key column '{column}'")]
    MissingKeyColumn { table: String, column: String },

    #[error("{table}: input column '{column}' is not a column of the table")]
    UnknownColumn { table: String, column: String },

    #[error("{table}: input header repeats column '{column}'")]
    DuplicateColumn { table: String, column: String },

    #[error("no table is mapped to input file '{file}'")]
    UnmappedFile { file: String },

    #[error("{table}: database error during {stage}: {source}")]
    Database {
        table: String,
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl LoadError {
    pub(crate) fn database(table: &str, stage: &'static str, source: sqlx::Error) -> Self {
        LoadError::Database {
            table: table.to_string(),
            stage,
            source,
        }
    }
}
