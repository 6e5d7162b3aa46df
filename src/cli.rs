//! Command-line interface definitions and helpers.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cloak color selectable from the command line.
///
/// The config file may define additional colors (e.g. yellow or custom
/// entries); those are reachable by editing the config, while the CLI
/// keeps a validated closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CloakColor {
    #[default]
    Red,
    Blue,
    Green,
}

impl CloakColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloakColor::Red => "red",
            CloakColor::Blue => "blue",
            CloakColor::Green => "green",
        }
    }
}

impl std::fmt::Display for CloakColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invisibility cloak effect for your webcam
#[derive(Parser, Debug)]
#[command(name = "cloakcam")]
#[command(version, about = "Invisibility cloak effect for your webcam", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Default red cloak
    cloakcam

    # Green cloak, record the output
    cloakcam --color green --record

    # External camera at 720p, no mask debug panel
    cloakcam --camera 1 --resolution 1280x720 --no-debug

    # List available cameras
    cloakcam list-cameras

CONTROLS:
    q / Esc   quit
    r         recapture the background
    space     toggle the mask debug panel")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Color of the cloak
    #[arg(long, value_enum, default_value_t = CloakColor::Red)]
    pub color: CloakColor,

    /// Record the composited output to a video file
    #[arg(long)]
    pub record: bool,

    /// Hide the mask debug panel
    #[arg(long)]
    pub no_debug: bool,

    /// Camera device index (from list-cameras)
    #[arg(long)]
    pub camera: Option<u32>,

    /// Requested capture resolution, WIDTHxHEIGHT
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<(u32, u32)>,

    /// Requested capture framerate
    #[arg(long, value_parser = parse_framerate)]
    pub fps: Option<u32>,

    /// Disable the horizontal mirror (selfie view)
    #[arg(long)]
    pub no_mirror: bool,

    /// Path to a config file (default: ~/.config/cloakcam/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available camera devices
    ListCameras,
}

/// Parse and validate resolution (WIDTHxHEIGHT format)
pub fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid resolution format '{}'. Use WIDTHxHEIGHT (e.g., 1280x720)",
            s
        ));
    }
    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width '{}' in resolution", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height '{}' in resolution", parts[1]))?;
    if width == 0 || height == 0 {
        return Err("Resolution width and height must be greater than 0".to_string());
    }
    if width > 7680 || height > 4320 {
        return Err("Resolution exceeds maximum supported (7680x4320)".to_string());
    }
    Ok((width, height))
}

/// Parse and validate framerate (1-120 fps)
pub fn parse_framerate(s: &str) -> Result<u32, String> {
    let fps: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid framerate", s))?;
    if !(1..=120).contains(&fps) {
        return Err(format!(
            "Framerate must be between 1 and 120 fps, got {}",
            fps
        ));
    }
    Ok(fps)
}
