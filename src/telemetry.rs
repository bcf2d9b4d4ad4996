use std::time::Duration;

use serde::Serialize;

use crate::loader::BatchOutcome;

/// Result of loading one input file
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub table: String,
    pub source_file: String,
    pub rows: usize,
    pub inserted: u64,
    pub updated: u64,
    /// Distinct records written; lower than `rows` when keys repeat
    pub records_written: usize,
    pub committed: bool,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn new(table: &str, source_file: &str, outcome: &BatchOutcome) -> Self {
        Self {
            table: table.to_string(),
            source_file: source_file.to_string(),
            rows: outcome.rows,
            inserted: outcome.inserted,
            updated: outcome.updated,
            records_written: outcome.records_written,
            committed: outcome.committed,
            duration_ms: outcome.duration.as_millis() as u64,
        }
    }
}

/// Aggregate of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub dry_run: bool,
    pub tables_created: usize,
    pub batches: Vec<BatchReport>,
    /// Input files with no table mapping
    pub skipped_files: Vec<String>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(run_id: String, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            tables_created: 0,
            batches: Vec::new(),
            skipped_files: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(|b| b.rows).sum()
    }

    pub fn total_inserted(&self) -> u64 {
        self.batches.iter().map(|b| b.inserted).sum()
    }

    pub fn total_updated(&self) -> u64 {
        self.batches.iter().map(|b| b.updated).sum()
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batches.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.batches.iter().map(|b| b.duration_ms).collect();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}

fn as_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(table: &str, inserted: u64, updated: u64, duration_ms: u64) -> BatchReport {
        BatchReport {
            table: table.to_string(),
            source_file: format!("Sales.{table}.csv"),
            rows: (inserted + updated) as usize,
            inserted,
            updated,
            records_written: (inserted + updated) as usize,
            committed: true,
            duration_ms,
        }
    }

    #[test]
    fn test_totals() {
        let mut summary = RunSummary::new("run".to_string(), false);
        summary.batches.push(report("Customer", 3, 1, 10));
        summary.batches.push(report("Product", 0, 5, 20));

        assert_eq!(summary.total_rows(), 9);
        assert_eq!(summary.total_inserted(), 3);
        assert_eq!(summary.total_updated(), 6);
    }

    #[test]
    fn test_percentiles() {
        let mut summary = RunSummary::new("run".to_string(), false);
        assert_eq!(summary.percentile(50.0), None);

        for ms in [40, 10, 30, 20] {
            summary.batches.push(report("T", 1, 0, ms));
        }
        assert_eq!(summary.get_percentiles(), (Some(20), Some(40), Some(40)));
        assert_eq!(summary.percentile(0.0), Some(10));
    }

    #[test]
    fn test_summary_serializes_duration_as_millis() {
        let mut summary = RunSummary::new("abc".to_string(), true);
        summary.duration = Duration::from_millis(1500);
        summary.skipped_files.push("notes.csv".to_string());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["run_id"], "abc");
        assert_eq!(json["duration_ms"], 1500);
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["skipped_files"][0], "notes.csv");
    }
}
