use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rgbaconfig::{NormalizationSetting, PresentModeSetting, TruncationSetting};

use crate::patterns::Pattern;

#[derive(Parser, Debug)]
#[command(
    name = "rgbaview",
    author,
    version,
    about = "Stream BGRA frames into GPU-presented windows",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Renderer settings file (TOML).
    #[arg(long, value_name = "FILE", global = true, env = "RGBAVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of windows, one texture each.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub windows: u32,

    /// Frame size in pixels (e.g. `640x360`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, default_value = "640x360")]
    pub size: (u32, u32),

    /// Synthetic content: `solid`, `gradient` or `checker`.
    #[arg(long, value_name = "PATTERN", value_parser = parse_pattern, default_value = "gradient")]
    pub pattern: Pattern,

    /// Extra bytes appended to every row to exercise strided uploads.
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub stride_padding: u32,

    /// Alternate between full and half frame size every N frames.
    #[arg(long, value_name = "FRAMES")]
    pub resize_every: Option<u64>,

    /// Exit after every window presented this many frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Override `pipeline.normalization` (`shader` or `host`).
    #[arg(long, value_name = "MODE", value_parser = rgbaconfig::parse_normalization)]
    pub normalization: Option<NormalizationSetting>,

    /// Override `pipeline.truncation` (`reject`, `drop` or `clamp`).
    #[arg(long, value_name = "POLICY", value_parser = rgbaconfig::parse_truncation)]
    pub truncation: Option<TruncationSetting>,

    /// Override `gpu.present_mode` (`fifo`, `mailbox` or `immediate`).
    #[arg(long, value_name = "MODE", value_parser = rgbaconfig::parse_present_mode)]
    pub present_mode: Option<PresentModeSetting>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open windows and stream frames (the default).
    Run,
    /// Parse and validate a settings file, then print the resolved settings.
    CheckConfig {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the platform version and the GPU adapter that would be used.
    Info,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width == 0 || height == 0 {
        return Err("size must be non-zero in both dimensions".to_string());
    }
    Ok((width, height))
}

pub fn parse_pattern(value: &str) -> Result<Pattern, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "solid" => Ok(Pattern::Solid),
        "gradient" => Ok(Pattern::Gradient),
        "checker" | "checkerboard" => Ok(Pattern::Checker),
        other => Err(format!(
            "unknown pattern '{other}' (expected solid, gradient or checker)"
        )),
    }
}
