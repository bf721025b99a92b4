//! Framebridge CLI
//!
//! Loads a CSV file or URL into a worker-hosted engine, optionally runs a
//! lazy plan over it, and prints the resulting shape and columns.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use framebridge::{Bridge, BridgeConfig, CsvSource};
use framebridge_types::{Expr, ReadOptions, all, col};

/// Load CSV data through a framebridge worker
#[derive(Parser, Debug)]
#[command(name = "framebridge")]
#[command(about = "Load CSV data through a framebridge worker", long_about = None)]
struct Args {
    /// http(s) URL or local file path
    source: String,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Columns to keep, comma separated (`*` for all)
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Drop rows containing nulls
    #[arg(long)]
    drop_nulls: bool,

    /// Only consider these columns when dropping nulls, comma separated
    #[arg(long, value_delimiter = ',', requires = "drop_nulls")]
    subset: Vec<String>,

    /// The first row is data, not column names
    #[arg(long)]
    no_header: bool,

    /// Field separator (single byte)
    #[arg(long)]
    separator: Option<String>,

    /// Stop after reading this many rows
    #[arg(long)]
    num_rows: Option<usize>,

    /// Parser threads for this read
    #[arg(long)]
    num_threads: Option<usize>,
}

impl Args {
    fn read_options(&self) -> ReadOptions {
        let mut options = ReadOptions::default();
        if self.no_header {
            options = options.with_has_header(false);
        }
        if let Some(separator) = &self.separator {
            options = options.with_separator(separator.clone());
        }
        if let Some(num_rows) = self.num_rows {
            options = options.with_num_rows(num_rows);
        }
        if let Some(num_threads) = self.num_threads {
            options = options.with_num_threads(num_threads);
        }
        options
    }

    fn selection(&self) -> Vec<Expr> {
        self.select
            .iter()
            .map(|name| if name == "*" { all() } else { col(name.as_str()) })
            .collect()
    }

    fn has_plan(&self) -> bool {
        self.drop_nulls || !self.select.is_empty()
    }
}

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("framebridge=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    let source = load_source(&args.source).await?;

    info!("Starting framebridge v{}", env!("CARGO_PKG_VERSION"));
    let bridge = Bridge::start_polars(config).await?;

    let frame = bridge.read_csv(source, args.read_options()).await?;
    debug!("Loaded {} as {}", args.source, frame.handle());

    let frame = if args.has_plan() {
        let mut plan = frame.lazy();
        if args.drop_nulls {
            let subset = (!args.subset.is_empty()).then(|| args.subset.clone());
            plan = plan.drop_nulls(subset);
        }
        if !args.select.is_empty() {
            plan = plan.select(args.selection());
        }
        plan.collect().await?
    } else {
        frame
    };

    let shape = frame.shape().await?;
    let columns = frame.columns().await?;
    println!("shape: {}", shape);
    println!("columns: {}", columns.join(", "));

    drop(frame);
    bridge.shutdown().await?;
    Ok(())
}

/// URLs go to the bridge as they are; anything else is read from disk here.
async fn load_source(source: &str) -> Result<CsvSource> {
    if source.contains("://") {
        return Ok(CsvSource::from(source));
    }
    let buf = tokio::fs::read(source)
        .await
        .with_context(|| format!("failed to read {}", source))?;
    Ok(CsvSource::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_options_from_flags() {
        let args = Args::parse_from([
            "framebridge",
            "data.csv",
            "--no-header",
            "--separator",
            ";",
            "--num-rows",
            "10",
            "--num-threads",
            "2",
        ]);
        let options = args.read_options();
        assert_eq!(options.has_header, Some(false));
        assert_eq!(options.separator.as_deref(), Some(";"));
        assert_eq!(options.num_rows, Some(10));
        assert_eq!(options.num_threads, Some(2));
        assert!(!args.has_plan());
    }

    #[test]
    fn test_plan_flags() {
        let args = Args::parse_from([
            "framebridge",
            "https://example.com/data.csv",
            "--select",
            "id,*",
            "--drop-nulls",
            "--subset",
            "name",
        ]);
        assert!(args.has_plan());
        assert_eq!(args.selection(), vec![col("id"), all()]);
        assert_eq!(args.subset, vec!["name"]);
        assert_eq!(args.read_options(), ReadOptions::default());
    }
}
