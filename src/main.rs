//! Redfire DTMF command line tool

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use colored::*;
use tracing::{debug, info};

use redfire_dtmf::{
    config::DtmfConfig,
    core::{AnalysisReport, DtmfEngine},
    protocols::dtmf::Keypad,
    utils::setup_logging,
};

#[derive(Parser)]
#[command(name = "redfire-dtmf")]
#[command(about = "DTMF reference file generator and multichannel WAV decoder")]
#[command(version = redfire_dtmf::VERSION)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["output", "input", "list", "generate_config"])
))]
struct Cli {
    /// Synthesize DIGITS into <digits>.wav files, one key per channel
    #[arg(short = 'o', long = "output", value_name = "DIGITS")]
    output: Option<String>,

    /// Decode the key sequence recorded in FILE
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: Option<PathBuf>,

    /// Show channel count, sample rate and bit depth of FILE
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    list: Option<PathBuf>,

    /// Print the default configuration as TOML
    #[arg(long)]
    generate_config: bool,

    /// Sample rate in Hz
    #[arg(short = 'r', long = "rate")]
    rate: Option<u32>,

    /// Channels per generated file
    #[arg(short = 'c', long = "channels")]
    channels: Option<u16>,

    /// Bits per sample (16, 24, 32)
    #[arg(short = 'b', long = "bits")]
    bits: Option<u16>,

    /// Output directory for generated files
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Length of each generated file
    #[arg(long)]
    duration_ms: Option<u32>,

    /// Accept A-D, * and # in addition to 0-9
    #[arg(long)]
    extended: bool,

    /// Analysis window as a percentage of one second
    #[arg(long)]
    window_percent: Option<u32>,

    /// Print the analysis report as JSON
    #[arg(long)]
    json: bool,

    /// Print parameters and the per-window symbol matrix
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE", env = "REDFIRE_DTMF_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            let code = err
                .downcast_ref::<redfire_dtmf::Error>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.generate_config {
        return generate_default_config();
    }

    let config = load_configuration(cli)?;

    // Held until exit so buffered file logs are flushed
    let _log_guard = setup_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting {} v{}", redfire_dtmf::NAME, redfire_dtmf::VERSION);

    let engine = DtmfEngine::new(config)?;

    if let Some(digits) = &cli.output {
        let out_dir = engine.config().synthesis.output_dir.clone();
        return generate(&engine, digits, Path::new(&out_dir), cli.verbose);
    }

    if let Some(path) = &cli.input {
        return analyze(&engine, path, cli.json, cli.verbose);
    }

    if let Some(path) = &cli.list {
        return show_info(&engine, path, cli.json);
    }

    Ok(())
}

fn load_configuration(cli: &Cli) -> anyhow::Result<DtmfConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        DtmfConfig::load_from_file(config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?
    } else {
        match DtmfConfig::load_from_env() {
            Ok(config) => config,
            Err(_) => DtmfConfig::default_config(),
        }
    };

    let synthesis = &mut config.synthesis;
    if let Some(rate) = cli.rate {
        synthesis.sample_rate = rate;
    }
    if let Some(channels) = cli.channels {
        synthesis.channels = channels;
    }
    if let Some(bits) = cli.bits {
        synthesis.bits_per_sample = bits;
    }
    if let Some(dir) = &cli.dir {
        synthesis.output_dir = dir.display().to_string();
    }
    if let Some(duration_ms) = cli.duration_ms {
        synthesis.duration_ms = duration_ms;
    }
    if cli.extended {
        synthesis.keypad = Keypad::Extended;
        config.analysis.keypad = Keypad::Extended;
    }
    if let Some(window_percent) = cli.window_percent {
        config.analysis.window_percent = window_percent;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn generate(engine: &DtmfEngine, digits: &str, out_dir: &Path, verbose: bool) -> anyhow::Result<()> {
    if verbose {
        let synthesis = &engine.config().synthesis;
        println!("{}", "Synthesis".bold().blue());
        println!("  Sample Rate: {} Hz", synthesis.sample_rate);
        println!("  Channels:    {}", synthesis.channels);
        println!("  Bits:        {}", synthesis.bits_per_sample);
        println!("  Duration:    {} ms", synthesis.duration_ms);
        println!("  Keypad:      {:?}", synthesis.keypad);
        println!("  Output:      {}", out_dir.display());
        println!();
    }

    let files = engine.generate(digits, out_dir)?;
    for file in &files {
        println!("{}", file.display());
    }

    debug!("Generated {} files", files.len());
    Ok(())
}

fn analyze(engine: &DtmfEngine, path: &Path, json: bool, verbose: bool) -> anyhow::Result<()> {
    let report = engine
        .analyze(path)
        .with_context(|| format!("Failed to analyze {}", path.display()))?;

    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    if verbose {
        print_report(engine, &report);
    }

    println!("{}", report.sequence);
    Ok(())
}

fn print_report(engine: &DtmfEngine, report: &AnalysisReport) {
    let params = engine.decoder().classifier().params();

    println!("{}", report.file.bold().blue());
    println!("  Channels:        {}", report.header.channels);
    println!("  Sample Rate:     {} Hz", report.header.sample_rate);
    println!("  Bits:            {}", report.header.bits_per_sample);
    println!("  Frames:          {}", report.header.frames);
    println!("  Window:          {} samples", report.window);
    println!("  Detection Floor: {}", params.detection_floor);
    println!("  Purity Ratio:    {}", params.purity_ratio);
    println!();

    println!("{:<10} {}", "Channel".bold(), "Windows".bold());
    println!("{}", "─".repeat(60));
    for (chan, row) in report.windows.iter().enumerate() {
        let cells: String = row
            .chars()
            .map(|c| if c == '?' { c.to_string().dimmed().to_string() } else { c.to_string().green().to_string() })
            .collect();
        println!("{:<10} {}", chan, cells);
    }
    println!();
}

fn show_info(engine: &DtmfEngine, path: &Path, json: bool) -> anyhow::Result<()> {
    let header = engine
        .info(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&header)?);
    } else {
        println!(
            "chan={} rate={} bits={} frames={}",
            header.channels, header.sample_rate, header.bits_per_sample, header.frames
        );
    }

    Ok(())
}

fn generate_default_config() -> anyhow::Result<()> {
    let config = DtmfConfig::default_config();
    let toml_content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    println!("{}", toml_content);
    Ok(())
}
