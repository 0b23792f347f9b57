#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use datasense::config::{load_dotenv, Config};
use datasense::ml::{anomaly, charts, classify, clustering, forecast, insights, output, pipeline};
use datasense::structs::{
    AnomalyOptions, ClusterOptions, Dataset, DatasenseError, DetectionMethod, ForecastMethod,
    ForecastOptions, Result, TaskKind,
};
use datasense::MethodSelector;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Datasense - anomalies, insights, forecasts and chart advice for tabular data
#[derive(Parser, Debug)]
#[command(name = "datasense")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Base URL of the remote model server (overrides DATASENSE_REMOTE_URL)
    #[arg(long, global = true)]
    remote_url: Option<String>,

    /// Disable the in-process model runtime
    #[arg(long, global = true)]
    no_local_model: bool,

    /// Report "no method available" instead of falling back to statistics
    #[arg(long, global = true)]
    no_statistical_fallback: bool,
}

#[derive(Args, Debug)]
struct Input {
    /// Input CSV file
    #[arg(short, long, conflicts_with = "json")]
    csv: Option<PathBuf>,

    /// Treat the CSV input as TSV
    #[arg(long, requires = "csv")]
    tsv: bool,

    /// Input JSON file (array of objects, or {"rows": [...]})
    #[arg(short, long)]
    json: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every analysis and print the combined report
    Analyze {
        #[command(flatten)]
        input: Input,

        /// Forecast horizon
        #[arg(long, default_value = "6")]
        horizon: usize,

        /// Also write summary.txt, anomalies.csv, forecast.csv and report.json here
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Detect anomalous values in numeric fields
    Anomalies {
        #[command(flatten)]
        input: Input,

        /// Fields to inspect (default: all numeric fields)
        #[arg(short, long)]
        field: Vec<String>,

        #[arg(short, long, value_enum, default_value = "all")]
        method: DetectionArg,

        /// Z-score threshold
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Surface trends, correlations, outliers and periodic patterns
    Insights {
        #[command(flatten)]
        input: Input,
    },

    /// Forecast a numeric field
    Forecast {
        #[command(flatten)]
        input: Input,

        #[arg(long, default_value = "6")]
        horizon: usize,

        /// Field to forecast (default: first purely numeric column)
        #[arg(short, long)]
        field: Option<String>,

        #[arg(short, long, value_enum, default_value = "auto")]
        method: ForecastArg,
    },

    /// Suggest visualizations
    Charts {
        #[command(flatten)]
        input: Input,

        #[arg(short, long)]
        field: Vec<String>,
    },

    /// K-means clustering over complete numeric rows
    Cluster {
        #[command(flatten)]
        input: Input,

        #[arg(short, long)]
        field: Vec<String>,

        /// Number of clusters (0 = auto)
        #[arg(short = 'k', long, default_value = "0")]
        clusters: usize,
    },

    /// Classify every column
    Profile {
        #[command(flatten)]
        input: Input,

        /// Leading rows to sample for type inference
        #[arg(long)]
        sample: Option<usize>,
    },

    /// Show which backend each task would use
    Probe,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DetectionArg {
    Zscore,
    Iqr,
    Isolation,
    All,
}

impl From<DetectionArg> for DetectionMethod {
    fn from(arg: DetectionArg) -> Self {
        match arg {
            DetectionArg::Zscore => Self::ZScore,
            DetectionArg::Iqr => Self::Iqr,
            DetectionArg::Isolation => Self::Isolation,
            DetectionArg::All => Self::All,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ForecastArg {
    Linear,
    Exponential,
    Trend,
    Auto,
}

impl From<ForecastArg> for ForecastMethod {
    fn from(arg: ForecastArg) -> Self {
        match arg {
            ForecastArg::Linear => Self::Linear,
            ForecastArg::Exponential => Self::Exponential,
            ForecastArg::Trend => Self::Trend,
            ForecastArg::Auto => Self::Auto,
        }
    }
}

fn main() {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(url) = cli.remote_url {
        config.backend.remote_url = Some(url);
    }
    if cli.no_local_model {
        config.backend.local_model = false;
    }
    if cli.no_statistical_fallback {
        config.backend.statistical_fallback = false;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_clone = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, abandoning pending backend calls...");
        cancel_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| DatasenseError::Config(format!("Failed to set Ctrl+C handler: {e}")))?;

    let selector = MethodSelector::from_config(&config.backend).with_cancel_flag(cancel);
    let analysis = &config.analysis;

    let Some(command) = cli.command else {
        eprintln!("No subcommand provided. Use 'datasense analyze' or 'datasense probe'.");
        eprintln!("Run 'datasense --help' for usage information.");
        std::process::exit(1);
    };

    match command {
        Commands::Analyze {
            input,
            horizon,
            output_dir,
        } => {
            let (dataset, source) = load(&input)?;
            let report = pipeline::analyze(&dataset, horizon, &selector, analysis)?;
            if let Some(dir) = output_dir {
                let written = output::write_all(&dir, &source, &report)?;
                eprintln!("Output written to {}", dir.display());
                for path in written {
                    eprintln!("  - {}", path.display());
                }
            }
            print_json(&report)
        }

        Commands::Anomalies {
            input,
            field,
            method,
            threshold,
        } => {
            let (dataset, _) = load(&input)?;
            let options = AnomalyOptions {
                fields: non_empty(field),
                method: method.into(),
                threshold: threshold.unwrap_or(analysis.zscore_threshold),
            };
            let report = anomaly::detect(&dataset, &options, &selector.session(), analysis)?;
            print_json(&report)
        }

        Commands::Insights { input } => {
            let (dataset, _) = load(&input)?;
            print_json(&insights::generate(&dataset, analysis)?)
        }

        Commands::Forecast {
            input,
            horizon,
            field,
            method,
        } => {
            let (dataset, _) = load(&input)?;
            let options = ForecastOptions {
                field,
                method: method.into(),
            };
            let report =
                forecast::forecast(&dataset, horizon, &options, &selector.session(), analysis)?;
            print_json(&report)
        }

        Commands::Charts { input, field } => {
            let (dataset, _) = load(&input)?;
            let fields = non_empty(field);
            print_json(&charts::suggest(&dataset, fields.as_deref())?)
        }

        Commands::Cluster {
            input,
            field,
            clusters,
        } => {
            let (dataset, _) = load(&input)?;
            let options = ClusterOptions {
                fields: non_empty(field),
                k: clusters,
            };
            let result = clustering::cluster(&dataset, &options)?;
            eprint!("{}", result.summary());
            print_json(&result)
        }

        Commands::Profile { input, sample } => {
            let (dataset, _) = load(&input)?;
            let profiles = classify::classify(&dataset, sample)?;
            for profile in &profiles {
                eprintln!("{}", profile.summary());
            }
            print_json(&profiles)
        }

        Commands::Probe => {
            let session = selector.session();
            let decisions = [
                session.select(TaskKind::AnomalyDetection, true),
                session.select(TaskKind::Forecasting, true),
            ];
            print_json(&decisions)
        }
    }
}

/// Load the dataset named on the command line, returning it with its source path
fn load(input: &Input) -> Result<(Dataset, String)> {
    let (dataset, path) = match (&input.csv, &input.json) {
        (Some(path), _) => (load_checked(path, |p| Dataset::from_csv_path(p, input.tsv))?, path),
        (None, Some(path)) => (load_checked(path, Dataset::from_json_path)?, path),
        (None, None) => {
            return Err(DatasenseError::Config(
                "No input given; pass --csv or --json".into(),
            ))
        }
    };

    eprintln!(
        "Loaded {} rows x {} columns from {}",
        dataset.row_count(),
        dataset.columns().len(),
        path.display()
    );
    Ok((dataset, path.display().to_string()))
}

fn load_checked(path: &Path, loader: impl Fn(&Path) -> Result<Dataset>) -> Result<Dataset> {
    if !path.exists() {
        return Err(DatasenseError::Config(format!(
            "Input file not found: {}",
            path.display()
        )));
    }
    loader(path)
}

fn non_empty(fields: Vec<String>) -> Option<Vec<String>> {
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
