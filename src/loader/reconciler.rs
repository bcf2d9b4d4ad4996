//! Transactional insert-or-update of one prepared batch

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use super::LoadError;
use super::batch::{PreparedBatch, RowKey, TypedRow};
use super::plan::plan;
use super::statement;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::db::schema::FieldType;
use crate::db::session::{Param, Session, SessionTransaction};

/// Counts for one reconciled batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub rows: usize,
    pub inserted: u64,
    pub updated: u64,
    /// Distinct records written (one per key)
    pub records_written: usize,
    pub committed: bool,
    pub duration: Duration,
}

/// Applies prepared batches to the database, one transaction per batch
#[derive(Debug, Clone)]
pub struct Reconciler {
    batch_size: usize,
    dry_run: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Reconciler {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            dry_run: false,
        }
    }

    /// Look up keys and classify rows without writing anything
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Reconcile `batch` against the stored table and commit it atomically
    ///
    /// On any failure the transaction is rolled back and nothing from the
    /// batch remains.
    pub async fn reconcile(
        &self,
        session: &mut Session,
        batch: &PreparedBatch<'_>,
    ) -> Result<BatchOutcome, LoadError> {
        let start = Instant::now();
        let table = batch.schema.name;

        if batch.is_empty() {
            debug!(table, "batch has no rows, nothing to reconcile");
            return Ok(BatchOutcome {
                rows: 0,
                inserted: 0,
                updated: 0,
                records_written: 0,
                committed: false,
                duration: start.elapsed(),
            });
        }

        let mut tx = session
            .begin()
            .await
            .map_err(|source| LoadError::database(table, "begin", source))?;

        let applied = self.apply(&mut tx, batch).await;

        let (inserted, updated, records_written) = match applied {
            Ok(counts) => counts,
            Err(e) => {
                error!(table, error = %e, "batch failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(table, error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        };

        let committed = if self.dry_run {
            tx.rollback()
                .await
                .map_err(|source| LoadError::database(table, "rollback", source))?;
            false
        } else {
            tx.commit().await.map_err(|source| {
                error!(table, error = %source, "commit failed");
                LoadError::database(table, "commit", source)
            })?;
            true
        };

        let duration = start.elapsed();
        info!(
            table,
            rows = batch.len(),
            inserted,
            updated,
            committed,
            duration_ms = duration.as_millis() as u64,
            "batch reconciled"
        );

        Ok(BatchOutcome {
            rows: batch.len(),
            inserted,
            updated,
            records_written,
            committed,
            duration,
        })
    }

    async fn apply(
        &self,
        tx: &mut SessionTransaction<'_>,
        batch: &PreparedBatch<'_>,
    ) -> Result<(u64, u64, usize), LoadError> {
        let existing = fetch_existing_keys(tx, batch).await?;
        let plan = plan(&batch.rows, &existing);
        debug!(
            table = batch.schema.name,
            existing = existing.len(),
            staged = plan.staged.len(),
            "batch classified"
        );

        for (row, action) in batch.rows.iter().zip(&plan.actions) {
            trace!(table = batch.schema.name, row = row.position, key = %row.key, ?action);
        }

        if !self.dry_run {
            self.write_staged(tx, batch, &plan.staged).await?;
        }

        Ok((plan.inserted, plan.updated, plan.staged.len()))
    }

    async fn write_staged(
        &self,
        tx: &mut SessionTransaction<'_>,
        batch: &PreparedBatch<'_>,
        staged: &[&TypedRow],
    ) -> Result<(), LoadError> {
        let schema = batch.schema;
        let column_types: Vec<FieldType> = batch
            .layout
            .columns
            .iter()
            .map(|idx| schema.columns[*idx].field_type)
            .collect();

        let chunk_size = statement::records_per_write(&batch.layout, self.batch_size);
        for chunk in staged.chunks(chunk_size) {
            let sql = statement::upsert(schema, &batch.layout, tx.backend(), chunk.len());
            let mut params: Vec<Param<'_>> = Vec::with_capacity(chunk.len() * column_types.len());
            for row in chunk {
                params.extend(row.values.iter().zip(column_types.iter().copied()));
            }

            tx.execute(&sql, &params).await.map_err(|source| {
                let first = chunk.first().map(|row| row.position).unwrap_or_default();
                error!(
                    table = schema.name,
                    first_row = first,
                    records = chunk.len(),
                    error = %source,
                    "write statement failed"
                );
                LoadError::database(schema.name, "write", source)
            })?;
        }

        Ok(())
    }
}

/// Stored keys among the keys of `batch`
async fn fetch_existing_keys(
    tx: &mut SessionTransaction<'_>,
    batch: &PreparedBatch<'_>,
) -> Result<HashSet<RowKey>, LoadError> {
    let schema = batch.schema;
    let key_types: Vec<FieldType> = schema.key_columns().map(|col| col.field_type).collect();

    let mut seen: HashSet<&RowKey> = HashSet::with_capacity(batch.len());
    let mut distinct: Vec<&TypedRow> = Vec::with_capacity(batch.len());
    for row in &batch.rows {
        if seen.insert(&row.key) {
            distinct.push(row);
        }
    }

    let mut existing = HashSet::new();
    for chunk in distinct.chunks(statement::keys_per_fetch(schema)) {
        let sql = statement::select_existing_keys(schema, tx.backend(), chunk.len());
        let mut params: Vec<Param<'_>> = Vec::with_capacity(chunk.len() * key_types.len());
        for row in chunk {
            for (slot, field_type) in batch.layout.key_slots.iter().zip(&key_types) {
                params.push((&row.values[*slot], *field_type));
            }
        }

        let keys = tx
            .fetch_keys(&sql, &params, &key_types)
            .await
            .map_err(|source| LoadError::database(schema.name, "key lookup", source))?;
        existing.extend(keys.into_iter().map(RowKey));
    }

    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{Column, TableSchema};
    use crate::formats::{Record, RecordSet};

    const ITEM: TableSchema = TableSchema {
        name: "Item",
        source_file: "Test.Item",
        columns: &[
            Column::new("ItemID", FieldType::Integer),
            Column::new("Name", FieldType::Varchar(20)),
            Column::new("Price", FieldType::Decimal {
                precision: 18,
                scale: 2,
            }),
        ],
        primary_key: &["ItemID"],
    };

    fn records(header: &[&str], rows: &[&[&str]]) -> RecordSet {
        RecordSet {
            header: header.iter().map(|s| s.to_string()).collect(),
            records: rows
                .iter()
                .enumerate()
                .map(|(i, fields)| Record {
                    position: i + 1,
                    line: i as u64 + 2,
                    fields: fields.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
            bytes_read: 0,
        }
    }

    async fn session_with_item() -> Session {
        let mut session = Session::sqlite_in_memory().await.unwrap();
        session.execute(&ITEM.create_table_ddl()).await.unwrap();
        session
    }

    async fn count(session: &mut Session) -> i64 {
        match session {
            Session::Sqlite(conn) => sqlx::query_scalar("SELECT COUNT(*) FROM \"Item\"")
                .fetch_one(conn)
                .await
                .unwrap(),
            Session::Postgres(_) => unreachable!(),
        }
    }

    async fn name_of(session: &mut Session, id: i64) -> Option<String> {
        match session {
            Session::Sqlite(conn) => {
                sqlx::query_scalar("SELECT \"Name\" FROM \"Item\" WHERE \"ItemID\" = ?")
                    .bind(id)
                    .fetch_one(conn)
                    .await
                    .unwrap()
            }
            Session::Postgres(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_update() {
        let mut session = session_with_item().await;
        let reconciler = Reconciler::new(10);

        let first = records(&["ItemID", "Name"], &[&["1", "A"]]);
        let batch = PreparedBatch::prepare(&ITEM, &first).unwrap();
        let outcome = reconciler.reconcile(&mut session, &batch).await.unwrap();
        assert_eq!((outcome.inserted, outcome.updated), (1, 0));
        assert!(outcome.committed);

        let second = records(&["ItemID", "Name"], &[&["1", "A2"], &["2", "B"]]);
        let batch = PreparedBatch::prepare(&ITEM, &second).unwrap();
        let outcome = reconciler.reconcile(&mut session, &batch).await.unwrap();
        assert_eq!((outcome.inserted, outcome.updated), (1, 1));

        assert_eq!(count(&mut session).await, 2);
        assert_eq!(name_of(&mut session, 1).await.as_deref(), Some("A2"));
    }

    #[tokio::test]
    async fn test_small_batch_size_splits_statements() {
        let mut session = session_with_item().await;
        let reconciler = Reconciler::new(2);

        let rows: Vec<Vec<String>> = (1..=7)
            .map(|i| vec![i.to_string(), format!("N{}", i)])
            .collect();
        let row_refs: Vec<Vec<&str>> = rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        let slices: Vec<&[&str]> = row_refs.iter().map(Vec::as_slice).collect();
        let set = records(&["ItemID", "Name"], &slices);

        let batch = PreparedBatch::prepare(&ITEM, &set).unwrap();
        let outcome = reconciler.reconcile(&mut session, &batch).await.unwrap();

        assert_eq!(outcome.inserted, 7);
        assert_eq!(count(&mut session).await, 7);
    }

    #[tokio::test]
    async fn test_absent_columns_are_left_untouched() {
        let mut session = session_with_item().await;
        let reconciler = Reconciler::default();

        let full = records(&["ItemID", "Name", "Price"], &[&["1", "A", "3,50"]]);
        let batch = PreparedBatch::prepare(&ITEM, &full).unwrap();
        reconciler.reconcile(&mut session, &batch).await.unwrap();

        let partial = records(&["ItemID", "Price"], &[&["1", "4,00"]]);
        let batch = PreparedBatch::prepare(&ITEM, &partial).unwrap();
        let outcome = reconciler.reconcile(&mut session, &batch).await.unwrap();

        assert_eq!(outcome.updated, 1);
        assert_eq!(name_of(&mut session, 1).await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_dry_run_rolls_back() {
        let mut session = session_with_item().await;
        let reconciler = Reconciler::new(10).dry_run(true);

        let set = records(&["ItemID", "Name"], &[&["1", "A"], &["2", "B"]]);
        let batch = PreparedBatch::prepare(&ITEM, &set).unwrap();
        let outcome = reconciler.reconcile(&mut session, &batch).await.unwrap();

        assert_eq!(outcome.inserted, 2);
        assert!(!outcome.committed);
        assert_eq!(count(&mut session).await, 0);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_batch() {
        let mut session = session_with_item().await;
        // Enforce a constraint the loader does not check itself
        session
            .execute("CREATE TRIGGER reject_x BEFORE INSERT ON \"Item\" WHEN NEW.\"Name\" = 'X' BEGIN SELECT RAISE(ABORT, 'rejected'); END")
            .await
            .unwrap();

        let reconciler = Reconciler::new(1);
        let set = records(&["ItemID", "Name"], &[&["1", "A"], &["2", "X"]]);
        let batch = PreparedBatch::prepare(&ITEM, &set).unwrap();
        let err = reconciler.reconcile(&mut session, &batch).await.unwrap_err();

        assert!(matches!(err, LoadError::Database { stage: "write", .. }));
        assert_eq!(count(&mut session).await, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let mut session = session_with_item().await;
        let set = records(&["ItemID", "Name"], &[]);
        let batch = PreparedBatch::prepare(&ITEM, &set).unwrap();
        let outcome = Reconciler::default()
            .reconcile(&mut session, &batch)
            .await
            .unwrap();
        assert_eq!(outcome.rows, 0);
        assert!(!outcome.committed);
    }
}
