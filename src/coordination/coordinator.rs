use anyhow::{Context, Result};
use derive_builder::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::discovery::{self, Discovery, MappedFile};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::db::Session;
use crate::db::catalog::ALL_TABLES;
use crate::formats::{DelimitedConfig, delimited};
use crate::loader::{LoadError, PreparedBatch, Reconciler};
use crate::telemetry::{BatchReport, RunSummary};

/// Configuration for one run over an input directory
#[derive(Debug, Clone, Builder)]
pub struct LoadConfig {
    pub input_dir: PathBuf,
    #[builder(default)]
    pub delimited: DelimitedConfig,
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,
    #[builder(default = "true")]
    pub create_tables: bool,
    /// Treat input files without a table mapping as fatal
    #[builder(default)]
    pub strict: bool,
    #[builder(default)]
    pub dry_run: bool,
    #[builder(default)]
    pub quiet: bool,
}

/// The Coordinator drives a run: one session, one batch per mapped file.
pub struct Coordinator<'s> {
    session: &'s mut Session,
}

impl<'s> Coordinator<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Run the complete load
    ///
    /// 1. Generate a run ID
    /// 2. Discover input files and map them to tables
    /// 3. Report (or, when strict, reject) unmapped files
    /// 4. Create missing tables
    /// 5. Load each mapped file as one batch, stopping at the first failure
    pub async fn run_load(&mut self, config: &LoadConfig) -> Result<RunSummary> {
        let start_time = Instant::now();

        // 1. Generate run ID
        let run_id = Uuid::new_v4().to_string();
        info!("Starting load run: {}", run_id);
        let mut summary = RunSummary::new(run_id, config.dry_run);

        // 2. Discover input files
        let discovery = discovery::discover(&config.input_dir).await?;
        info!(
            "Found {} mapped and {} unmapped input files in '{}'",
            discovery.mapped.len(),
            discovery.unmapped.len(),
            config.input_dir.display()
        );

        // 3. Unmapped files
        summary.skipped_files = Self::check_unmapped(&discovery, config.strict)?;

        // 4. Create tables
        if config.create_tables {
            summary.tables_created = self.ensure_tables_exist().await?;
        }

        // 5. Load files in catalog order
        let reconciler = Reconciler::new(config.batch_size).dry_run(config.dry_run);
        let progress = Self::setup_progress_tracking(config, discovery.mapped.len())?;

        for file in &discovery.mapped {
            progress.set_message(file.file_name());

            match self.load_file(file, config, &reconciler).await {
                Ok(report) => {
                    summary.batches.push(report);
                    progress.inc(1);
                }
                Err(e) => {
                    progress.abandon_with_message(format!("failed at {}", file.file_name()));
                    error!(
                        table = file.schema.name,
                        file = %file.path.display(),
                        committed_batches = summary.batches.len(),
                        "run stopped: {:#}",
                        e
                    );
                    return Err(e).with_context(|| {
                        format!(
                            "Load stopped at '{}' (table {}); {} earlier batch(es) stay committed",
                            file.file_name(),
                            file.schema.name,
                            summary.batches.len()
                        )
                    });
                }
            }
        }
        progress.finish_with_message("all files loaded");

        summary.duration = start_time.elapsed();
        info!(
            "Load complete: {} batches, {} rows ({} inserted, {} updated) in {:.2}s",
            summary.batches.len(),
            summary.total_rows(),
            summary.total_inserted(),
            summary.total_updated(),
            summary.duration.as_secs_f64()
        );

        Ok(summary)
    }

    /// Warn about unmapped files, or fail on the first one when strict
    fn check_unmapped(discovery: &Discovery, strict: bool) -> Result<Vec<String>, LoadError> {
        let mut skipped = Vec::with_capacity(discovery.unmapped.len());
        for path in &discovery.unmapped {
            let file = discovery::display_name(path);
            if strict {
                return Err(LoadError::UnmappedFile { file });
            }
            warn!("No table mapping for '{}', skipping", file);
            skipped.push(file);
        }
        Ok(skipped)
    }

    /// Run `CREATE TABLE IF NOT EXISTS` for every catalog table
    async fn ensure_tables_exist(&mut self) -> Result<usize> {
        for schema in ALL_TABLES {
            schema.validate()?;
            self.session
                .execute(&schema.create_table_ddl())
                .await
                .with_context(|| format!("Failed to create table '{}'", schema.name))?;
        }
        info!("Ensured {} tables exist", ALL_TABLES.len());
        Ok(ALL_TABLES.len())
    }

    async fn load_file(
        &mut self,
        file: &MappedFile,
        config: &LoadConfig,
        reconciler: &Reconciler,
    ) -> Result<BatchReport> {
        let schema = file.schema;
        info!("Loading '{}' into {}", file.file_name(), schema.name);

        let records = delimited::read_file(&file.path, &config.delimited).await?;
        debug!(
            file = %file.path.display(),
            delimiter = %config.delimited.delimiter_as_string(),
            bytes = records.bytes_read,
            rows = records.len(),
            "input file parsed"
        );
        let batch = PreparedBatch::prepare(schema, &records)?;
        let outcome = reconciler.reconcile(self.session, &batch).await?;

        Ok(BatchReport::new(schema.name, &file.file_name(), &outcome))
    }

    /// File-level progress bar; hidden when quiet
    fn setup_progress_tracking(config: &LoadConfig, total_files: usize) -> Result<ProgressBar> {
        if config.quiet {
            return Ok(ProgressBar::hidden());
        }

        let bar = ProgressBar::new(total_files as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] Files: [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        Ok(bar)
    }
}
