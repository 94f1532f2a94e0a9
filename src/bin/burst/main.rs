//! kuba-burst command line
//!
//! Replays a flow table through a streaming burst detector and writes one
//! score record per event.
//!
//! # CLI Commands
//!
//! - `score <FILE>` - Score every flow in a table (`-` reads stdin)
//! - `check-config` - Validate configuration file
//! - `threshold` - Print the decision threshold for the configured mode
//!
//! # Configuration
//!
//! The configuration is read from:
//! 1. `--config <PATH>`
//! 2. `BURST_CONFIG` environment variable (path to TOML file)
//! 3. `./burst.toml` in current directory
//! 4. Default configuration

mod config;

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kuba_burst::config::Config;
use kuba_burst::detector::ScoreMode;
use kuba_burst::ingestion::{FlowReplayer, FlowTableReader};
use kuba_burst::report::{summarize_by_tick, write_tick_summaries, ReportFormat, ReportWriter, ScoreRecord};
use kuba_burst::Monitor;
use tracing::{debug, info};

// =============================================================================
// CLI Definition
// =============================================================================

/// kuba-burst - Streaming edge-burst anomaly detection
#[derive(Parser)]
#[command(name = "kuba-burst")]
#[command(author = "Victor Oseghale")]
#[command(version)]
#[command(about = "Streaming edge-burst anomaly detection (MIDAS-R)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (overrides BURST_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every flow in a table
    Score(ScoreArgs),

    /// Validate configuration file and print a summary
    CheckConfig,

    /// Print the decision threshold
    Threshold {
        #[command(flatten)]
        detector: DetectorArgs,
    },
}

/// Detector overrides shared by several commands
#[derive(Args, Debug)]
struct DetectorArgs {
    /// Output transform (raw, log, pvalue)
    #[arg(short, long)]
    mode: Option<ScoreMode>,

    /// Significance level of the threshold
    #[arg(short, long)]
    alpha: Option<f64>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Flow table (timestamp, src, dst[, label]); `-` reads stdin
    file: PathBuf,

    #[command(flatten)]
    detector: DetectorArgs,

    /// Decay applied to current-tick counters on tick change
    #[arg(long)]
    decay: Option<f64>,

    /// Tick length in seconds
    #[arg(long)]
    ticksize: Option<f64>,

    /// Replay speed relative to the recording (omit for no pacing)
    #[arg(long)]
    speed: Option<f64>,

    /// Leading records to skip
    #[arg(long)]
    skip: Option<usize>,

    /// Maximum records to score
    #[arg(long)]
    limit: Option<usize>,

    /// Log and skip malformed lines instead of aborting
    #[arg(long)]
    lenient: bool,

    /// Output format (csv, jsonl)
    #[arg(short, long)]
    format: Option<ReportFormat>,

    /// Only write anomalous records
    #[arg(long)]
    anomalies_only: bool,

    /// Print per-tick summaries instead of per-event records
    #[arg(long)]
    summary: bool,
}

impl DetectorArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.detector.midas.mode = mode;
        }
        if let Some(alpha) = self.alpha {
            config.detector.midas.alpha = alpha;
        }
    }
}

impl ScoreArgs {
    fn apply(&self, config: &mut Config) {
        self.detector.apply(config);

        let midas = &mut config.detector.midas;
        if let Some(decay) = self.decay {
            midas.decay = decay;
        }
        if let Some(ticksize) = self.ticksize {
            midas.ticksize = ticksize;
        }

        let ingestion = &mut config.ingestion;
        if self.speed.is_some() {
            ingestion.speed = self.speed;
        }
        if let Some(skip) = self.skip {
            ingestion.skip = skip;
        }
        if self.limit.is_some() {
            ingestion.limit = self.limit;
        }
        ingestion.lenient |= self.lenient;

        if let Some(format) = self.format {
            config.report.format = format;
        }
        config.report.anomalies_only |= self.anomalies_only;
    }
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.monitoring.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.monitoring.log_target)
        .with_writer(io::stderr)
        .init();
}

/// Replay a flow table through the configured detector
fn cmd_score(cli: &Cli, args: &ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, source) = config::load(cli.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    init_tracing(&config);

    info!("Starting kuba-burst v{}", env!("CARGO_PKG_VERSION"));
    debug!(source = %source, ?config, "Configuration loaded");

    let mut monitor = config.detector.kind.build(&config.detector)?;
    monitor.initialize()?;

    let input: Box<dyn BufRead> = if args.file.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(std::fs::File::open(&args.file)?))
    };
    let reader = FlowTableReader::new(input, config.ingestion.table_config());
    let mut replayer = FlowReplayer::new(reader, config.ingestion.replay_config());

    let stdout = io::stdout().lock();
    let mut writer = ReportWriter::new(stdout, config.report.format)
        .anomalies_only(config.report.anomalies_only);
    let mut scored = Vec::new();
    let mut anomalies = 0usize;

    for record in replayer.by_ref() {
        let record = record?;
        let (score, anomalous) = monitor.evaluate(&record)?;
        if anomalous {
            anomalies += 1;
        }

        let row = ScoreRecord::from_flow(&record, score, anomalous);
        if args.summary {
            scored.push(row);
        } else {
            writer.write(&row)?;
        }
    }

    let out = writer.finish()?;
    if args.summary {
        let summaries = summarize_by_tick(&scored, config.detector.midas.ticksize);
        write_tick_summaries(out, &summaries, config.report.format)?;
    }

    info!(
        records = replayer.emitted(),
        skipped = config.ingestion.skip.min(replayer.seen()),
        malformed = replayer.malformed(),
        anomalies,
        threshold = monitor.threshold()?,
        "Replay complete"
    );
    Ok(())
}

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (config, source) = config::load(cli.config.as_deref())?;
    let midas = &config.detector.midas;

    println!("Configuration is valid!");
    println!("  Source: {}", source);
    println!();
    println!("Detector:");
    println!("  Kind: {}", config.detector.kind);
    println!("  Error rate: {}", midas.error_rate);
    println!("  False positive probability: {}", midas.false_pos_prob);
    println!("  Decay: {}", midas.decay);
    println!("  Tick size: {}s", midas.ticksize);
    println!("  Alpha: {}", midas.alpha);
    println!("  Mode: {}", midas.mode);
    println!("  Aggregation: {}", midas.aggregation);
    match midas.precision {
        Some(p) => println!("  Precision: {} decimal places", p),
        None => println!("  Precision: unrounded"),
    }
    println!("  Threshold: {:.6}", midas.threshold());
    println!();
    println!("Ingestion:");
    println!("  Delimiter: {:?}", config.ingestion.delimiter);
    println!("  Header: {:?}", config.ingestion.header);
    match config.ingestion.speed {
        Some(speed) => println!("  Speed: {}x", speed),
        None => println!("  Speed: unpaced"),
    }
    println!();
    println!("Report:");
    println!("  Format: {}", config.report.format);
    println!("  Anomalies only: {}", config.report.anomalies_only);
    println!();
    println!("Monitoring:");
    println!("  Log level: {}", config.monitoring.log_level);
    Ok(())
}

/// Print the frozen decision threshold
fn cmd_threshold(cli: &Cli, args: &DetectorArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, _) = config::load(cli.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let midas = &config.detector.midas;
    let comparison = if midas.mode.higher_is_anomalous() { ">" } else { "<" };
    println!(
        "{} (anomalous when {} score {} threshold, alpha = {})",
        midas.threshold(),
        midas.mode,
        comparison,
        midas.alpha
    );
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Score(args) => cmd_score(&cli, args),
        Commands::CheckConfig => cmd_check_config(&cli),
        Commands::Threshold { detector } => cmd_threshold(&cli, detector),
    }
}
