//! A single database session, PostgreSQL or SQLite.
//!
//! A run acquires exactly one session and uses it for every batch. Each batch
//! runs inside a [`SessionTransaction`]; dropping a transaction without
//! committing rolls it back.
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Database, Encode, Row, Type};

use super::schema::FieldType;
use crate::config::CONNECT_TIMEOUT;
use crate::formats::normalize::{KeyPart, Value};

/// Database flavor behind a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    /// Detect the backend from a connection URL
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.trim().to_ascii_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Backend::Postgres)
        } else if lower.starts_with("sqlite:") {
            Some(Backend::Sqlite)
        } else {
            None
        }
    }

    /// Bind placeholder for the 1-based parameter `idx`
    pub fn placeholder(&self, idx: usize) -> String {
        match self {
            Backend::Postgres => format!("${}", idx),
            Backend::Sqlite => "?".to_string(),
        }
    }
}

/// A bound statement parameter: the value plus its declared column type,
/// which decides the SQL type of a NULL
pub type Param<'a> = (&'a Value, FieldType);

/// Connection that can be either Postgres or SQLite
pub enum Session {
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

impl Session {
    /// Open a session for `url` (`postgres://...` or `sqlite:...`)
    pub async fn connect(url: &str) -> Result<Self> {
        let backend = Backend::from_url(url)
            .with_context(|| format!("Unsupported database URL scheme in '{}'", redact(url)))?;

        let session = match backend {
            Backend::Postgres => {
                let options = PgConnectOptions::from_str(url)
                    .context("Invalid PostgreSQL connection URL")?;
                let conn = tokio::time::timeout(CONNECT_TIMEOUT, options.connect())
                    .await
                    .map_err(|_| sqlx::Error::PoolTimedOut)
                    .and_then(|result| result)
                    .context("Failed to connect to PostgreSQL")?;
                Session::Postgres(conn)
            }
            Backend::Sqlite => {
                let options = SqliteConnectOptions::from_str(url)
                    .context("Invalid SQLite connection URL")?
                    .create_if_missing(true);
                let conn = tokio::time::timeout(CONNECT_TIMEOUT, options.connect())
                    .await
                    .map_err(|_| sqlx::Error::PoolTimedOut)
                    .and_then(|result| result)
                    .context("Failed to open SQLite database")?;
                Session::Sqlite(conn)
            }
        };

        tracing::info!(?backend, url = %redact(url), "database session opened");
        Ok(session)
    }

    /// Create an in-memory SQLite session for testing
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub fn backend(&self) -> Backend {
        match self {
            Session::Postgres(_) => Backend::Postgres,
            Session::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// Execute a statement without parameters (DDL)
    pub async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let result = match self {
            Session::Postgres(conn) => sqlx::query(sql).execute(conn).await?.rows_affected(),
            Session::Sqlite(conn) => sqlx::query(sql).execute(conn).await?.rows_affected(),
        };
        Ok(result)
    }

    /// Start a transaction on this session
    pub async fn begin(&mut self) -> Result<SessionTransaction<'_>, sqlx::Error> {
        Ok(match self {
            Session::Postgres(conn) => SessionTransaction::Postgres(conn.begin().await?),
            Session::Sqlite(conn) => SessionTransaction::Sqlite(conn.begin().await?),
        })
    }

    /// Close the connection gracefully
    pub async fn close(self) -> Result<()> {
        let backend = self.backend();
        match self {
            Session::Postgres(conn) => conn.close().await,
            Session::Sqlite(conn) => conn.close().await,
        }
        .context("Failed to close database session")?;
        tracing::debug!(?backend, "database session closed");
        Ok(())
    }
}

/// An open transaction on a [`Session`]
pub enum SessionTransaction<'c> {
    Postgres(sqlx::Transaction<'c, sqlx::Postgres>),
    Sqlite(sqlx::Transaction<'c, sqlx::Sqlite>),
}

impl SessionTransaction<'_> {
    pub fn backend(&self) -> Backend {
        match self {
            SessionTransaction::Postgres(_) => Backend::Postgres,
            SessionTransaction::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// Execute a statement with typed parameters, returning rows affected
    pub async fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64, sqlx::Error> {
        let affected = match self {
            SessionTransaction::Postgres(tx) => {
                let query = bind_params(sqlx::query::<sqlx::Postgres>(sql), params);
                query.execute(&mut **tx).await?.rows_affected()
            }
            SessionTransaction::Sqlite(tx) => {
                let query = bind_params(sqlx::query::<sqlx::Sqlite>(sql), params);
                query.execute(&mut **tx).await?.rows_affected()
            }
        };
        Ok(affected)
    }

    /// Run a query whose result columns are key parts of the given types
    ///
    /// Integer key columns must be selected as BIGINT and character key
    /// columns as TEXT.
    pub async fn fetch_keys(
        &mut self,
        sql: &str,
        params: &[Param<'_>],
        key_types: &[FieldType],
    ) -> Result<Vec<Vec<KeyPart>>, sqlx::Error> {
        match self {
            SessionTransaction::Postgres(tx) => {
                let query = bind_params(sqlx::query::<sqlx::Postgres>(sql), params);
                let rows = query.fetch_all(&mut **tx).await?;
                rows.iter().map(|row| decode_key(row, key_types)).collect()
            }
            SessionTransaction::Sqlite(tx) => {
                let query = bind_params(sqlx::query::<sqlx::Sqlite>(sql), params);
                let rows = query.fetch_all(&mut **tx).await?;
                rows.iter().map(|row| decode_key(row, key_types)).collect()
            }
        }
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            SessionTransaction::Postgres(tx) => tx.commit().await,
            SessionTransaction::Sqlite(tx) => tx.commit().await,
        }
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            SessionTransaction::Postgres(tx) => tx.rollback().await,
            SessionTransaction::Sqlite(tx) => tx.rollback().await,
        }
    }
}

/// Bind every parameter with the Rust type matching its column type
fn bind_params<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &[Param<'_>],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    Option<i32>: Encode<'q, DB> + Type<DB>,
    Option<i64>: Encode<'q, DB> + Type<DB>,
    Option<f64>: Encode<'q, DB> + Type<DB>,
    Option<bool>: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
    Option<NaiveDate>: Encode<'q, DB> + Type<DB>,
    Option<NaiveDateTime>: Encode<'q, DB> + Type<DB>,
{
    for (value, field_type) in params {
        query = match value {
            Value::Integer(v) => query.bind(Some(*v)),
            Value::BigInt(v) => query.bind(Some(*v)),
            Value::Decimal(v) | Value::Float(v) => query.bind(Some(*v)),
            Value::Boolean(v) => query.bind(Some(*v)),
            Value::Text(v) => query.bind(Some(v.clone())),
            Value::Date(v) => query.bind(Some(*v)),
            Value::DateTime(v) => query.bind(Some(*v)),
            Value::Null => bind_null(query, *field_type),
        };
    }
    query
}

/// Bind NULL typed for the column
fn bind_null<'q, DB>(
    query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    field_type: FieldType,
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    Option<i32>: Encode<'q, DB> + Type<DB>,
    Option<i64>: Encode<'q, DB> + Type<DB>,
    Option<f64>: Encode<'q, DB> + Type<DB>,
    Option<bool>: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
    Option<NaiveDate>: Encode<'q, DB> + Type<DB>,
    Option<NaiveDateTime>: Encode<'q, DB> + Type<DB>,
{
    match field_type {
        FieldType::Integer => query.bind(None::<i32>),
        FieldType::BigInt => query.bind(None::<i64>),
        FieldType::Decimal { .. } | FieldType::Float => query.bind(None::<f64>),
        FieldType::Boolean => query.bind(None::<bool>),
        FieldType::Varchar(_) | FieldType::Text => query.bind(None::<String>),
        FieldType::Date => query.bind(None::<NaiveDate>),
        FieldType::DateTime => query.bind(None::<NaiveDateTime>),
    }
}

fn decode_key<R>(row: &R, key_types: &[FieldType]) -> Result<Vec<KeyPart>, sqlx::Error>
where
    R: Row,
    usize: sqlx::ColumnIndex<R>,
    i64: for<'r> sqlx::Decode<'r, R::Database> + Type<R::Database>,
    String: for<'r> sqlx::Decode<'r, R::Database> + Type<R::Database>,
{
    key_types
        .iter()
        .enumerate()
        .map(|(idx, field_type)| match field_type {
            FieldType::Integer | FieldType::BigInt => row.try_get::<i64, _>(idx).map(KeyPart::Int),
            _ => row.try_get::<String, _>(idx).map(KeyPart::Text),
        })
        .collect()
}

/// Strip credentials from a connection URL before logging it
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
