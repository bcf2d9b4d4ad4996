use anyhow::Result;

use crate::config::DEFAULT_DELIMITER;

/// A single record (row) from the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based position among the data rows (header excluded)
    pub position: usize,
    /// Line in the source file where the record starts
    pub line: u64,
    pub fields: Vec<String>,
}

/// Header and records of one delimited file
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub header: Vec<String>,
    pub records: Vec<Record>,
    pub bytes_read: u64,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Configuration for delimited file reading
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
}

impl DelimitedConfig {
    /// Convert delimiter byte to string representation
    pub(crate) fn delimiter_as_string(&self) -> String {
        if self.delimiter == b'\t' {
            "\\t".to_string()
        } else {
            String::from_utf8(vec![self.delimiter])
                .unwrap_or_else(|_| format!("\\x{:02x}", self.delimiter))
        }
    }

    pub fn with_delimiter(delimiter: u8) -> Result<Self> {
        if !delimiter.is_ascii() || delimiter == b'"' || delimiter == b'\n' {
            anyhow::bail!("Invalid delimiter byte 0x{:02x}", delimiter);
        }
        Ok(Self {
            delimiter,
            ..Self::default()
        })
    }
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            quote: b'"',
        }
    }
}
