use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use passconfig::TierSetting;

#[derive(Parser, Debug)]
#[command(
    name = "backdrop",
    author,
    version,
    about = "Animated multi-pass fragment-shader backgrounds",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = passconfig::parse_size)]
    pub size: Option<(u32, u32)>,

    /// GL context tier: `auto` (GLES 3.0, falling back to 2.0) or `baseline` (GLES 2.0 only).
    #[arg(long, value_name = "TIER", value_parser = parse_tier)]
    pub tier: Option<TierSetting>,

    /// Stop after this long (e.g. `30s`, `5m`).
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Present frames without waiting for vertical sync.
    #[arg(long)]
    pub no_vsync: bool,
}

/// Where the pass list comes from.
#[derive(Parser, Debug, Default)]
pub struct SourceArgs {
    /// Pass configuration file; defaults to `backdrop.toml` in the config directory.
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Fragment shader to run as a pass, in order; the last one is displayed.
    #[arg(long = "shader", value_name = "FILE", conflicts_with = "config")]
    pub shaders: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a configuration and its shader files, then print the pass plan.
    Check(SourceArgs),
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_tier(value: &str) -> Result<TierSetting, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("tier must not be empty".to_string());
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "auto" | "default" => Ok(TierSetting::Auto),
        "baseline" | "gles2" | "webgl1" => Ok(TierSetting::Baseline),
        other => Err(format!("unknown tier '{other}'; expected auto or baseline")),
    }
}
