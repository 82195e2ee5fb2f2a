//! stagegrid CLI - Command-line interface for stagegrid
//!
//! Commands:
//! - process: Resample one sensor log into an experiment directory (or JSON on stdout)
//! - batch: Process every log in a folder in parallel
//! - inspect: Report how a log is read, without resampling
//! - config: Print the default configuration

use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use stagegrid::dataset::{DatasetBuilder, TIME_COLUMN};
use stagegrid::normalizer::{TimeNormalizer, TimeResolution};
use stagegrid::pipeline::{experiment_name, DEFAULT_EXTENSION};
use stagegrid::reader::{TableReader, DEFAULT_DELIMITER};
use stagegrid::types::Diagnostic;
use stagegrid::{ExperimentProcessor, ProcessError, ResampleConfig, PRODUCER_NAME, STAGEGRID_VERSION};

/// stagegrid - Uniform-grid resampling and stage segmentation for reactor logs
#[derive(Parser)]
#[command(name = "stagegrid")]
#[command(version = STAGEGRID_VERSION)]
#[command(about = "Resample reactor sensor logs and split them by stage", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resample one sensor log
    Process {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (use - to print the JSON report to stdout)
        #[arg(short, long, default_value = "processed")]
        output: PathBuf,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Process every sensor log in a folder
    Batch {
        /// Input folder
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "processed")]
        output: PathBuf,

        /// File extension to pick up
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,

        #[command(flatten)]
        options: ProcessOptions,
    },

    /// Report the detected time format, channels and stage column of a log
    Inspect {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Field separator: "tab", "comma", or a single ASCII character
        #[arg(long, default_value = "tab")]
        delimiter: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Args)]
struct ProcessOptions {
    /// Load configuration from a JSON file (flags override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid step in minutes
    #[arg(long)]
    interval: Option<f64>,

    /// Widest gap (minutes) interpolated across
    #[arg(long)]
    max_gap: Option<f64>,

    /// Minimum observations for a cubic fit
    #[arg(long)]
    min_points: Option<usize>,

    /// Keep only grid points that coincide with a raw observation
    #[arg(long)]
    exclude_interpolated: bool,

    /// Field separator: "tab", "comma", or a single ASCII character
    #[arg(long, default_value = "tab")]
    delimiter: String,
}

impl ProcessOptions {
    fn resolve_config(&self) -> Result<ResampleConfig, StagegridCliError> {
        let mut config = match &self.config {
            Some(path) => ResampleConfig::from_json_file(path)?,
            None => ResampleConfig::default(),
        };

        if let Some(interval) = self.interval {
            config.resample_interval_minutes = interval;
        }
        if let Some(max_gap) = self.max_gap {
            config.max_gap_minutes = max_gap;
        }
        if let Some(min_points) = self.min_points {
            config.min_points_for_cubic = min_points;
        }
        if self.exclude_interpolated {
            config.exclude_interpolated_points = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn processor(&self) -> Result<ExperimentProcessor, StagegridCliError> {
        let reader = TableReader::new(parse_delimiter(&self.delimiter)?);
        Ok(ExperimentProcessor::with_reader(self.resolve_config()?, reader)?)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StagegridCliError> {
    match cli.command {
        Commands::Process {
            input,
            output,
            options,
        } => cmd_process(&input, &output, &options),
        Commands::Batch {
            input,
            output,
            extension,
            options,
        } => cmd_batch(&input, &output, &extension, &options),
        Commands::Inspect {
            input,
            delimiter,
            json,
        } => cmd_inspect(&input, &delimiter, json),
        Commands::Config => cmd_config(),
    }
}

fn cmd_process(input: &Path, output: &Path, options: &ProcessOptions) -> Result<(), StagegridCliError> {
    let processor = options.processor()?;

    if output.to_string_lossy() == "-" {
        let json = processor.report_json(input)?;
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", json)?;
        stdout.flush()?;
        return Ok(());
    }

    let dir = processor.process_and_export(input, output)?;
    println!("{}", dir.display());
    Ok(())
}

fn cmd_batch(
    input: &Path,
    output: &Path,
    extension: &str,
    options: &ProcessOptions,
) -> Result<(), StagegridCliError> {
    if !input.is_dir() {
        return Err(StagegridCliError::NotADirectory(input.to_path_buf()));
    }

    let processor = options.processor()?;
    let outcome = processor.process_folder(input, output, extension)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.processed.is_empty() && outcome.failed.is_empty() {
        Err(StagegridCliError::NoInputFiles(extension.to_string()))
    } else if !outcome.failed.is_empty() {
        Err(StagegridCliError::BatchFailed(outcome.failed.len()))
    } else {
        Ok(())
    }
}

fn cmd_inspect(input: &Path, delimiter: &str, json: bool) -> Result<(), StagegridCliError> {
    let reader = TableReader::new(parse_delimiter(delimiter)?);
    let table = reader.read_path(input)?;
    let name = experiment_name(input)?;

    let time_column = table.headers.get(TIME_COLUMN).cloned().unwrap_or_default();
    let (axis, _) = TimeNormalizer::normalize(&time_column, &table.column(TIME_COLUMN));
    let dataset = DatasetBuilder::build(&name, &table)?;

    let report = InspectReport {
        producer: PRODUCER_NAME.to_string(),
        version: STAGEGRID_VERSION.to_string(),
        dataset: name,
        rows: table.row_count(),
        time_column,
        time_resolution: axis.resolution,
        timed_rows: dataset.timed_sample_count(),
        stage_column: dataset.stage_column.clone(),
        channels: dataset.channels.clone(),
        diagnostics: dataset.diagnostics.clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("stagegrid Inspect Report");
    println!("========================");
    println!("Dataset:      {}", report.dataset);
    println!("Rows:         {} ({} timed)", report.rows, report.timed_rows);
    let resolution = match report.time_resolution {
        TimeResolution::Format(format) => format!("format {}", format),
        TimeResolution::PerValue => "per-value parsing".to_string(),
        TimeResolution::RowIndex => "row index fallback".to_string(),
    };
    println!("Time column:  {} ({})", report.time_column, resolution);
    println!(
        "Stage column: {}",
        report.stage_column.as_deref().unwrap_or("(none)")
    );
    println!("\nChannels:");
    for channel in &report.channels {
        println!("  {}", channel);
    }
    if !report.diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in &report.diagnostics {
            println!("  [WARN] {}", serde_json::to_string(diagnostic)?);
        }
    }

    Ok(())
}

fn cmd_config() -> Result<(), StagegridCliError> {
    println!("{}", serde_json::to_string_pretty(&ResampleConfig::default())?);
    Ok(())
}

fn parse_delimiter(value: &str) -> Result<u8, StagegridCliError> {
    match value {
        "tab" | "\\t" | "\t" => Ok(DEFAULT_DELIMITER),
        "comma" => Ok(b','),
        "semicolon" => Ok(b';'),
        other => match other.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(StagegridCliError::InvalidDelimiter(other.to_string())),
        },
    }
}

// Error types

#[derive(Debug)]
enum StagegridCliError {
    Io(io::Error),
    Process(ProcessError),
    Json(serde_json::Error),
    InvalidDelimiter(String),
    NotADirectory(PathBuf),
    NoInputFiles(String),
    BatchFailed(usize),
}

impl From<io::Error> for StagegridCliError {
    fn from(e: io::Error) -> Self {
        StagegridCliError::Io(e)
    }
}

impl From<ProcessError> for StagegridCliError {
    fn from(e: ProcessError) -> Self {
        StagegridCliError::Process(e)
    }
}

impl From<serde_json::Error> for StagegridCliError {
    fn from(e: serde_json::Error) -> Self {
        StagegridCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StagegridCliError> for CliError {
    fn from(e: StagegridCliError) -> Self {
        match e {
            StagegridCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StagegridCliError::Process(e) => {
                let (code, hint) = match &e {
                    ProcessError::Structural { .. } => (
                        "STRUCTURAL_ERROR",
                        "Ensure the first column holds timestamps",
                    ),
                    ProcessError::EmptyDataset(_) => {
                        ("EMPTY_DATASET", "Ensure the input has data rows below the header")
                    }
                    ProcessError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Run 'stagegrid config' for a valid configuration",
                    ),
                    ProcessError::ReadError(_) | ProcessError::Csv(_) => (
                        "READ_ERROR",
                        "Check the delimiter and that the file is a text table",
                    ),
                    ProcessError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ProcessError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            StagegridCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StagegridCliError::InvalidDelimiter(value) => CliError {
                code: "INVALID_DELIMITER".to_string(),
                message: format!("Unsupported delimiter '{}'", value),
                hint: Some("Use tab, comma, semicolon, or a single ASCII character".to_string()),
            },
            StagegridCliError::NotADirectory(path) => CliError {
                code: "NOT_A_DIRECTORY".to_string(),
                message: format!("'{}' is not a directory", path.display()),
                hint: Some("Pass a folder to 'stagegrid batch'".to_string()),
            },
            StagegridCliError::NoInputFiles(extension) => CliError {
                code: "NO_INPUT_FILES".to_string(),
                message: format!("No .{} files found", extension),
                hint: Some("Use --extension to pick other files".to_string()),
            },
            StagegridCliError::BatchFailed(count) => CliError {
                code: "BATCH_FAILED".to_string(),
                message: format!("{} datasets failed", count),
                hint: Some("Review the batch report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct InspectReport {
    producer: String,
    version: String,
    dataset: String,
    rows: usize,
    time_column: String,
    time_resolution: TimeResolution,
    timed_rows: usize,
    stage_column: Option<String>,
    channels: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}
