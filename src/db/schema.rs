use anyhow::Result;

/// Declared type of a table field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// Fixed-point decimal, bound as `f64`
    Decimal { precision: u8, scale: u8 },
    /// Double precision float
    Float,
    /// Bounded character string
    Varchar(u16),
    Text,
    Boolean,
    Date,
    /// Timestamp without time zone
    DateTime,
}

impl FieldType {
    /// Returns the SQL type name used in DDL
    ///
    /// The names are valid PostgreSQL types and map to the expected type
    /// affinity in SQLite.
    pub fn sql_type(&self) -> String {
        match self {
            FieldType::Integer => "INTEGER".to_string(),
            FieldType::BigInt => "BIGINT".to_string(),
            FieldType::Decimal { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
            FieldType::Float => "DOUBLE PRECISION".to_string(),
            FieldType::Varchar(len) => format!("VARCHAR({})", len),
            FieldType::Text => "TEXT".to_string(),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::DateTime => "TIMESTAMP".to_string(),
        }
    }

    /// Whether values of this type can take part in a primary key
    pub fn is_key_type(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::BigInt | FieldType::Varchar(_) | FieldType::Text
        )
    }
}

/// A column in a table schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl Column {
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// Fixed schema of one target table
///
/// Schemas are plain constants (see [`super::catalog`]) handed to the loader
/// explicitly.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Table name in the database
    pub name: &'static str,
    /// Stem of the input file that feeds this table (e.g. `Sales.Customer`)
    pub source_file: &'static str,
    pub columns: &'static [Column],
    /// Primary-key column names, in key order
    pub primary_key: &'static [&'static str],
}

impl TableSchema {
    /// Look up a column and its position by name
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, col)| col.name == name)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.primary_key.contains(&name)
    }

    /// Primary-key columns in key order
    pub fn key_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.primary_key
            .iter()
            .filter_map(move |key| self.column(key).map(|(_, col)| col))
    }

    /// Check that the key is non-empty, refers to declared columns, and uses
    /// key-compatible types
    pub fn validate(&self) -> Result<()> {
        if self.primary_key.is_empty() {
            anyhow::bail!("Table '{}' declares no primary key", self.name);
        }

        for key in self.primary_key {
            let Some((_, col)) = self.column(key) else {
                anyhow::bail!(
                    "Primary key column '{}' is not a column of table '{}'",
                    key,
                    self.name
                );
            };
            if !col.field_type.is_key_type() {
                anyhow::bail!(
                    "Primary key column '{}.{}' has unsupported key type {}",
                    self.name,
                    key,
                    col.field_type.sql_type()
                );
            }
        }

        for (idx, col) in self.columns.iter().enumerate() {
            if self.columns[..idx].iter().any(|c| c.name == col.name) {
                anyhow::bail!("Duplicate column '{}' in table '{}'", col.name, self.name);
            }
        }

        Ok(())
    }

    /// Generate the `CREATE TABLE IF NOT EXISTS` statement for this table
    pub fn create_table_ddl(&self) -> String {
        let mut ddl = format!("CREATE TABLE IF NOT EXISTS {} (\n", quote_ident(self.name));

        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let not_null = if self.is_key(col.name) { " NOT NULL" } else { "" };
                format!(
                    "  {} {}{}",
                    quote_ident(col.name),
                    col.field_type.sql_type(),
                    not_null
                )
            })
            .collect();

        let key_list: Vec<String> = self.primary_key.iter().map(|k| quote_ident(k)).collect();
        defs.push(format!("  PRIMARY KEY ({})", key_list.join(", ")));

        ddl.push_str(&defs.join(",\n"));
        ddl.push_str("\n)");

        ddl
    }
}

/// Quote an identifier for PostgreSQL and SQLite, preserving case
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
