pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod notification;
pub mod ocr;
pub mod state;
pub mod storage;
pub use error::{AppError, AppResult};

use clap::Parser;

/// Entrypoint used by the binary: parses arguments and runs one session.
pub fn run() -> AppResult<()> {
    logging::init();
    let cli = cli::Cli::parse();
    tracing::info!(input = %cli.input.display(), "starting retext");

    let config = config::load_app_config();
    let out = cli::execute(cli, &config)?;

    tracing::info!(output = %out.display(), "wrote edited image");
    Ok(())
}
