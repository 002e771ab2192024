//! `matchday run` / `matchday validate`: config-driven reconciliation.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use matchday_recon::adapter::{load_source, DumpFormat};
use matchday_recon::{reconcile, ReconConfig, ReconError, SourceStream};

use crate::exit_codes::{EXIT_RECON_EMPTY, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  matchday run mlb-nightly.recon.toml
  matchday run mlb-nightly.recon.toml --json
  matchday run mlb-nightly.recon.toml --output result.json
  RUST_LOG=matchday_recon=debug matchday run mlb-nightly.recon.toml")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  matchday validate mlb-nightly.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output } => cmd_recon_run(config, json, output),
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn config_err(err: ReconError) -> CliError {
    let hint = match &err {
        ReconError::UnknownSource(_) => Some("precedence lists may only name ids from [[sources]]"),
        ReconError::ConfigParse(_) => Some("check the TOML syntax and field names"),
        _ => None,
    };
    let e = recon_err(EXIT_RECON_INVALID_CONFIG, err.to_string());
    match hint {
        Some(h) => e.with_hint(h),
        None => e,
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(
            EXIT_RECON_RUNTIME,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    ReconConfig::from_toml(&config_str).map_err(config_err)
}

/// Resolve file paths relative to the config file's directory.
fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn load_streams(config: &ReconConfig, base_dir: &Path) -> Result<Vec<SourceStream>, CliError> {
    let mut streams = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let path = base_dir.join(&source.file);
        let data = std::fs::read_to_string(&path).map_err(|e| {
            recon_err(EXIT_RECON_RUNTIME, format!("cannot read {}: {e}", path.display()))
        })?;
        let stream = load_source(source, &data, DumpFormat::from_path(&path))
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, e.to_string()))?;
        log::info!("source '{}': {} records from {}", source.id, stream.records.len(), path.display());
        streams.push(stream);
    }
    Ok(streams)
}

fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let streams = load_streams(&config, base_dir(&config_path))?;

    let result = reconcile(&streams, &config.options());

    // Output
    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "recon '{}': {} records in, {} canonical: {} events ({} matched, {} single), {} texts ({} duplicates suppressed)",
        config.name,
        s.input_records,
        s.canonical_records,
        s.events,
        s.matched_groups,
        s.singletons,
        s.texts,
        s.suppressed_duplicates,
    );
    if s.excluded > 0 {
        let reasons: Vec<String> = s
            .exclusion_counts
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        eprintln!("excluded {} records: {}", s.excluded, reasons.join(", "));
    }
    if s.conflicted_records > 0 {
        eprintln!("{} records carry equal-precedence conflicts", s.conflicted_records);
    }

    if result.records.is_empty() {
        return Err(recon_err(EXIT_RECON_EMPTY, "zero records reconciled")
            .with_hint("check source files and the shape each source declares"));
    }

    Ok(())
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let base = base_dir(&config_path);
    let missing: Vec<String> = config
        .sources
        .iter()
        .map(|s| base.join(&s.file))
        .filter(|p| !p.is_file())
        .map(|p| p.display().to_string())
        .collect();

    eprintln!(
        "valid: recon '{}' with {} source(s), window {}s, threshold {}",
        config.name,
        config.sources.len(),
        config.window_secs,
        config.threshold,
    );
    for path in &missing {
        eprintln!("warning: source file not found: {path}");
    }

    Ok(())
}
