use std::path::Path;

use anyhow::{Context, Result};

use crate::formats::reader::{DelimitedConfig, Record, RecordSet};

/// Read a whole delimited file with a header row
pub async fn read_file(path: &Path, config: &DelimitedConfig) -> Result<RecordSet> {
    let buffer = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))?;

    parse(&buffer, config).with_context(|| format!("Failed to parse '{}'", path.display()))
}

/// Parse delimited bytes; the first record is the header
///
/// Records may be shorter than the header (trailing fields are missing) or
/// longer; length checks against the header happen during coercion.
pub fn parse(buffer: &[u8], config: &DelimitedConfig) -> Result<RecordSet> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .quote(config.quote)
        .has_headers(true)
        .flexible(true)
        .from_reader(buffer);

    let header: Vec<String> = csv_reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|name| name.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if header.iter().all(|name| name.is_empty()) {
        anyhow::bail!("Header row is empty");
    }

    let mut records = Vec::new();

    for (idx, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse record {}", idx + 1))?;

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        records.push(Record {
            position: idx + 1,
            line,
            fields: record.iter().map(|s| s.to_string()).collect(),
        });
    }

    Ok(RecordSet {
        header,
        records,
        bytes_read: buffer.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_semicolon_file() {
        let data = b"ProductID;Name;ListPrice\n1;Adjustable Race;0,00\n2;\"Bearing; Ball\";19,99\n";
        let set = parse(data, &DelimitedConfig::default()).unwrap();

        assert_eq!(set.header, vec!["ProductID", "Name", "ListPrice"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.records[0].position, 1);
        assert_eq!(set.records[0].line, 2);
        assert_eq!(set.records[1].fields, vec!["2", "Bearing; Ball", "19,99"]);
    }

    #[test]
    fn test_parse_strips_bom_and_whitespace() {
        let data = "\u{feff}CustomerID ; AccountNumber\n1;AW00000001\n".as_bytes();
        let set = parse(data, &DelimitedConfig::default()).unwrap();
        assert_eq!(set.header, vec!["CustomerID", "AccountNumber"]);
    }

    #[test]
    fn test_short_records_are_kept() {
        let data = b"a;b;c\n1;2\n3;4;5\n";
        let set = parse(data, &DelimitedConfig::default()).unwrap();
        assert_eq!(set.records[0].fields.len(), 2);
        assert_eq!(set.records[1].fields.len(), 3);
    }

    #[test]
    fn test_header_only_file() {
        let set = parse(b"a;b\n", &DelimitedConfig::default()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_file_is_an_error() {
        assert!(parse(b"", &DelimitedConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_read_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "id,name").unwrap();
        writeln!(temp_file, "1,Alice").unwrap();
        temp_file.flush().unwrap();

        let config = DelimitedConfig::with_delimiter(b',').unwrap();
        let set = read_file(temp_file.path(), &config).await.unwrap();

        assert_eq!(set.header, vec!["id", "name"]);
        assert_eq!(set.records[0].fields, vec!["1", "Alice"]);
        assert!(set.bytes_read > 0);
    }
}
