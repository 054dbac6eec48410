//! VarPass CLI

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use vp_calib::CalibrationSet;
use vp_engine::{AnalysisConfig, EventInput, EventProcessor};

#[derive(Parser)]
#[command(name = "varpass")]
#[command(about = "VarPass - systematic-variation event reprocessing")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reprocess events: one output line per (event, variation) pair
    Process {
        /// Input events (JSON lines). Defaults to stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Calibration set (JSON)
        #[arg(short, long)]
        calib: PathBuf,

        /// Analysis configuration (JSON). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output records (JSON lines). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the record layout a configuration declares
    Schema {
        /// Analysis configuration (JSON). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default analysis configuration
    DefaultConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => AnalysisConfig::from_path(p)
            .with_context(|| format!("loading configuration from {}", p.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn cmd_process(
    input: Option<&PathBuf>,
    calib: &Path,
    config: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let config = load_config(config)?;
    let calib = CalibrationSet::from_path(calib)
        .with_context(|| format!("loading calibration set from {}", calib.display()))?;
    let mut processor = EventProcessor::new(config, calib)?;

    let reader: Box<dyn BufRead> = match input {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("opening {}", p.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut writer: Box<dyn Write> = match output {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("creating {}", p.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut events = 0usize;
    let mut records = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: EventInput = serde_json::from_str(&line)
            .with_context(|| format!("parsing event on line {}", lineno + 1))?;
        for out in processor.process(&event)? {
            serde_json::to_writer(&mut writer, &out)?;
            writer.write_all(b"\n")?;
            records += 1;
        }
        events += 1;
    }
    writer.flush()?;
    tracing::info!(events, records, "reprocessing finished");
    Ok(())
}

fn cmd_schema(config: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let (schema, _) = vp_engine::schema::build(&config)?;
    let listing = serde_json::json!({
        "scalars": schema.scalar_names().collect::<Vec<_>>(),
        "arrays": schema.array_names().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn cmd_default_config() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&AnalysisConfig::default())?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Process { input, calib, config, output } => {
            cmd_process(input.as_ref(), &calib, config.as_ref(), output.as_ref())
        }
        Commands::Schema { config } => cmd_schema(config.as_ref()),
        Commands::DefaultConfig => cmd_default_config(),
    }
}
