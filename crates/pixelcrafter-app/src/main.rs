//! Main application entry point.

use clap::Parser;
use pixelcrafter_app::cli::{Cli, run};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("Starting PixelCrafter CLI");

    pollster::block_on(run(cli))
}
