mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use rrclean_batch::{
    batch::SUMMARY_FILE, read_registry, run_batch, write_summary, BatchConfig, CsvExporter,
    Exporter, RawExporter,
};
use rrclean_lib::{
    clean_bpm,
    io::{self as rr_io, csv::DEFAULT_RR_COLUMN, InputFormat},
    metrics::stats::Comparison,
    plot::figure_from_comparison,
    CleanerConfig, Recording,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "rrclean",
    version,
    about = "Clean RR-interval recordings into heart-rate datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Auto,
    Lines,
    Csv,
}

impl From<FormatArg> for InputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Auto => InputFormat::Auto,
            FormatArg::Lines => InputFormat::Lines,
            FormatArg::Csv => InputFormat::Csv,
        }
    }
}

/// Overrides for the cleaning parameters.
#[derive(Args, Debug, Clone)]
struct CleanerArgs {
    /// Median filter window (odd, samples)
    #[arg(long)]
    window: Option<usize>,
    /// Lowest plausible heart rate
    #[arg(long)]
    min_bpm: Option<f64>,
    /// Highest plausible heart rate
    #[arg(long)]
    max_bpm: Option<f64>,
    /// Leave non-finite or non-positive values in place
    #[arg(long)]
    no_interpolate: bool,
}

impl CleanerArgs {
    fn apply(&self, base: CleanerConfig) -> CleanerConfig {
        CleanerConfig {
            window: self.window.unwrap_or(base.window),
            min_bpm: self.min_bpm.unwrap_or(base.min_bpm),
            max_bpm: self.max_bpm.unwrap_or(base.max_bpm),
            interpolate: base.interpolate && !self.no_interpolate,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Input layout; `auto` picks CSV for .csv files
    #[arg(long, default_value = "auto")]
    format: FormatArg,
    /// RR interval column for CSV input
    #[arg(long, default_value = DEFAULT_RR_COLUMN)]
    column: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean one recording read from stdin or --input and print a JSON report
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        source: InputArgs,
        #[command(flatten)]
        cleaner: CleanerArgs,
    },
    /// Clean every recognised recording in a directory and export datasets
    Batch {
        /// Cohort registry (TOML)
        #[arg(long)]
        registry: PathBuf,
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,
        /// Also write the uncleaned time/rr_interval/bpm dataset per recording
        #[arg(long)]
        raw: bool,
        /// Draw one raw-vs-cleaned PNG per subject
        #[arg(long)]
        plot: bool,
        #[command(flatten)]
        source: InputArgs,
        #[command(flatten)]
        cleaner: CleanerArgs,
    },
    /// Render raw vs cleaned BPM of one recording to a PNG via plotters
    Plot {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        source: InputArgs,
        #[command(flatten)]
        cleaner: CleanerArgs,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean {
            input,
            source,
            cleaner,
        } => cmd_clean(input.as_deref(), &source, &cleaner)?,
        Commands::Batch {
            registry,
            input_dir,
            output_dir,
            raw,
            plot,
            source,
            cleaner,
        } => cmd_batch(
            &registry,
            input_dir,
            output_dir,
            raw,
            plot,
            &source,
            &cleaner,
        )?,
        Commands::Plot {
            input,
            out,
            source,
            cleaner,
        } => cmd_plot(&input, &out, &source, &cleaner)?,
    }
    Ok(())
}

fn read_recording(input: Option<&Path>, source: &InputArgs) -> Result<Recording> {
    let format = InputFormat::from(source.format);
    match input {
        Some(path) => Ok(rr_io::load(path, format, &source.column)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            let stdin = Path::new("<stdin>");
            let recording = match format {
                InputFormat::Csv => rr_io::csv::parse_rr_csv(
                    buf.as_bytes(),
                    stdin,
                    &source.column,
                    Some(rr_io::csv::DEFAULT_TIME_COLUMN),
                )?,
                _ => Recording::from_intervals(rr_io::text::parse_rr_lines(&buf, stdin)?),
            };
            Ok(recording)
        }
    }
}

#[derive(Serialize)]
struct CleanReport {
    n: usize,
    artifacts: usize,
    fill_value: f64,
    comparison: Comparison,
    bpm_raw: Vec<f64>,
    bpm_clean: Vec<f64>,
}

fn cmd_clean(input: Option<&Path>, source: &InputArgs, cleaner: &CleanerArgs) -> Result<()> {
    let recording = read_recording(input, source)?;
    let cfg = cleaner.apply(CleanerConfig::default());
    let raw = recording.bpm_series();
    let cleaned = clean_bpm(&raw, &cfg)?;
    let report = CleanReport {
        n: cleaned.len(),
        artifacts: cleaned.artifacts,
        fill_value: cleaned.fill_value,
        comparison: Comparison::new(&raw.bpm, &cleaned.values),
        bpm_raw: raw.bpm,
        bpm_clean: cleaned.values,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_batch(
    registry_path: &Path,
    input_dir: PathBuf,
    output_dir: PathBuf,
    raw: bool,
    plot: bool,
    source: &InputArgs,
    cleaner: &CleanerArgs,
) -> Result<()> {
    let registry = read_registry(registry_path)?;
    let cfg = BatchConfig {
        input_dir,
        output_dir,
        cleaner: cleaner.apply(registry.cleaning),
        format: source.format.into(),
        rr_column: source.column.clone(),
    };

    let mut raw_exporter = RawExporter::new(&cfg.output_dir, &registry.suffix);
    let mut csv_exporter = CsvExporter::new(&cfg.output_dir, &registry.suffix);
    let mut plot_exporter = render::PlotExporter::new(&cfg.output_dir, &registry.suffix);
    let mut exporters: Vec<&mut dyn Exporter> = Vec::new();
    if raw {
        exporters.push(&mut raw_exporter);
    }
    exporters.push(&mut csv_exporter);
    if plot {
        exporters.push(&mut plot_exporter);
    }

    let summary = run_batch(&registry, &cfg, &mut exporters)?;
    let summary_path = cfg.output_dir.join(SUMMARY_FILE);
    write_summary(&summary_path, &summary)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    info!(
        "batch done: {} succeeded, {} failed, {} skipped",
        summary.succeeded,
        summary.failed,
        summary.skipped.len()
    );
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_plot(input: &Path, out: &Path, source: &InputArgs, cleaner: &CleanerArgs) -> Result<()> {
    let recording = read_recording(Some(input), source)?;
    let cfg = cleaner.apply(CleanerConfig::default());
    let raw = recording.bpm_series();
    let cleaned = clean_bpm(&raw, &cfg)?;
    let title = input
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "recording".into());
    let fig = figure_from_comparison(&title, &raw.bpm, &cleaned.values, render::MAX_POINTS);
    render::draw_figure(out, &fig)?;
    info!("wrote {}", out.display());
    Ok(())
}
