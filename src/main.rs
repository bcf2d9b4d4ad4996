use clap::{Parser, Subcommand};
use sales_db_loader::runner::{LoadArgsBuilder, LoadResult, Settings, parse_delimiter, run_load};
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(version, about = "Load AdventureWorks sales extracts into a database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Upsert every mapped CSV file of the input directory
    Load {
        /// Connection URL (postgres://... or sqlite:...)
        #[arg(short, long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,

        /// Directory holding the CSV extracts
        #[arg(short, long, env = "CSV_FOLDER_PATH")]
        input_dir: Option<PathBuf>,

        /// Field delimiter (use \t for tab)
        #[arg(long, default_value = ";")]
        delimiter: String,

        /// Maximum records per write statement
        #[arg(short, long, default_value = "500")]
        batch_size: usize,

        /// Do not run CREATE TABLE IF NOT EXISTS before loading
        #[arg(long)]
        no_create_tables: bool,

        /// Fail when an input file has no table mapping
        #[arg(long)]
        strict: bool,

        /// Read, validate and classify rows without writing them
        #[arg(long)]
        dry_run: bool,

        /// Quiet mode - minimal output, only show summary
        #[arg(short, long)]
        quiet: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    match args.command {
        Command::Load {
            database_url,
            input_dir,
            delimiter,
            batch_size,
            no_create_tables,
            strict,
            dry_run,
            quiet,
            json,
        } => {
            let options = cli::LoadOptions {
                delimiter,
                batch_size,
                create_tables: !no_create_tables,
                strict,
                dry_run,
                quiet: quiet || json,
            };
            run_loader(database_url, input_dir, options, json).await?;
        }
    }
    Ok(())
}

async fn run_loader(
    database_url: Option<String>,
    input_dir: Option<PathBuf>,
    options: cli::LoadOptions,
    json: bool,
) -> anyhow::Result<()> {
    // Initialize tracing based on quiet mode
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let default_filter = if options.quiet {
        "sales_db_loader=warn,sqlx=warn"
    } else {
        "sales_db_loader=info,sqlx=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let settings = Settings::resolve(database_url, input_dir)?;
    let delimiter = parse_delimiter(&options.delimiter)?;

    if !options.quiet {
        println!("Sales DB Loader");
        println!("===============");
        println!("Database: {}", cli::redact_url(&settings.database_url));
        println!("Input directory: {}", settings.input_dir.display());
        println!("Batch size: {}", options.batch_size);
        if options.dry_run {
            println!("DRY RUN MODE - rows are classified but not written");
        }
        println!();
    }

    let load_args = LoadArgsBuilder::default()
        .database_url(settings.database_url)
        .input_dir(settings.input_dir)
        .delimiter(delimiter)
        .batch_size(options.batch_size)
        .create_tables(options.create_tables)
        .strict(options.strict)
        .dry_run(options.dry_run)
        .quiet(options.quiet)
        .build()?;

    let result = run_load(load_args).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn print_summary(result: &LoadResult) {
    println!();
    println!("Load Summary");
    println!("============");
    println!("Run ID: {}", result.run_id);
    for batch in &result.batches {
        println!(
            "  {:<22} {:>8} rows {:>8} inserted {:>8} updated  {}ms",
            batch.table, batch.rows, batch.inserted, batch.updated, batch.duration_ms
        );
    }
    if !result.skipped_files.is_empty() {
        println!("Skipped files (no table mapping):");
        for file in &result.skipped_files {
            println!("  {}", file);
        }
    }
    println!("Rows processed: {}", result.total_rows());
    println!("Records inserted: {}", result.total_inserted());
    println!("Records updated: {}", result.total_updated());
    if let (Some(p50), Some(p90), Some(p99)) = result.get_percentiles() {
        println!("Batch time: p50: {}ms, p90: {}ms, p99: {}ms", p50, p90, p99);
    }
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
    if result.dry_run {
        println!("Dry run: nothing was committed");
    }
}

/// CLI helpers
mod cli {
    /// Options passed through from the `load` subcommand
    pub struct LoadOptions {
        pub delimiter: String,
        pub batch_size: usize,
        pub create_tables: bool,
        pub strict: bool,
        pub dry_run: bool,
        pub quiet: bool,
    }

    /// Hide the password part of a connection URL
    pub fn redact_url(url: &str) -> String {
        let Some(scheme_end) = url.find("://") else {
            return url.to_string();
        };
        let rest = &url[scheme_end + 3..];
        match rest.rfind('@') {
            Some(at) => {
                let user = rest[..at].split(':').next().unwrap_or_default();
                format!("{}://{}:***{}", &url[..scheme_end], user, &rest[at..])
            }
            None => url.to_string(),
        }
    }

}
