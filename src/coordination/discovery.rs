//! Finding input files and pairing them with table schemas

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::INPUT_EXTENSION;
use crate::db::catalog::{self, ALL_TABLES};
use crate::db::schema::TableSchema;

/// An input file paired with the table it loads into
#[derive(Debug, Clone)]
pub struct MappedFile {
    pub path: PathBuf,
    pub schema: &'static TableSchema,
}

impl MappedFile {
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// Input files of one directory, split by whether a table claims them
#[derive(Debug, Default)]
pub struct Discovery {
    /// Mapped files in catalog load order
    pub mapped: Vec<MappedFile>,
    /// Files with the input extension that no table claims, sorted by name
    pub unmapped: Vec<PathBuf>,
}

/// Scan `dir` (non-recursively) for input files
pub async fn discover(dir: &Path) -> Result<Discovery> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list input directory '{}'", dir.display()))?;

    let mut discovery = Discovery::default();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list input directory '{}'", dir.display()))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file || !has_input_extension(&path) {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(file = %path.display(), "skipping file with a non UTF-8 name");
            continue;
        };

        match catalog::table_for_file(stem) {
            Some(schema) => {
                debug!(file = %path.display(), table = schema.name, "mapped input file");
                discovery.mapped.push(MappedFile { path, schema });
            }
            None => discovery.unmapped.push(path),
        }
    }

    discovery.mapped.sort_by_key(|file| load_rank(file.schema));
    discovery.unmapped.sort();
    Ok(discovery)
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(INPUT_EXTENSION))
}

fn load_rank(schema: &TableSchema) -> usize {
    ALL_TABLES
        .iter()
        .position(|table| table.name == schema.name)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), "a;b\n").unwrap();
    }

    #[tokio::test]
    async fn test_discover_maps_by_stem_in_catalog_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "Sales.SpecialOfferProduct.csv");
        touch(&dir, "Sales.Customer.csv");
        touch(&dir, "Production.Product.CSV");
        touch(&dir, "Sales.Store.csv");
        touch(&dir, "readme.txt");
        std::fs::create_dir(dir.path().join("Person.Person.csv")).unwrap();

        let discovery = discover(dir.path()).await.unwrap();

        let tables: Vec<&str> = discovery.mapped.iter().map(|f| f.schema.name).collect();
        assert_eq!(tables, vec!["Customer", "Product", "SpecialOfferProduct"]);
        assert_eq!(discovery.unmapped.len(), 1);
        assert_eq!(display_name(&discovery.unmapped[0]), "Sales.Store.csv");
    }

    #[tokio::test]
    async fn test_discover_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(discover(&dir.path().join("nope")).await.is_err());
    }
}
