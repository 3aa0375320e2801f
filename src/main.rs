// Prevents console window in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod app;

use std::process::ExitCode;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "display-blackout",
    about = "Black out secondary monitors with a global hotkey"
)]
pub struct Args {
    /// Reset all settings to their defaults before starting
    #[arg(long)]
    pub(crate) reset_settings: bool,

    /// Black out right after start-up
    #[arg(long)]
    pub(crate) blackout: bool,

    /// Black out automatically while a fullscreen game runs (this session)
    #[arg(long)]
    pub(crate) game_mode: bool,

    /// Monitors to black out from now on, as `x,y,w,h` keys joined by `|`
    /// (an empty value restores the default: every non-primary monitor)
    #[arg(long, value_name = "KEYS")]
    pub(crate) select: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    #[cfg(windows)]
    {
        app::run(&args)
    }

    #[cfg(not(windows))]
    {
        log::error!("display-blackout needs Windows (ignoring {args:?})");
        ExitCode::FAILURE
    }
}
