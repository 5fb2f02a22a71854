mod cli;
mod error;
mod logging;
mod model;
mod orchestrator;
mod server;
mod session;
mod text_mode;
#[cfg(test)]
mod testutil;
#[cfg(feature = "tui")]
mod tui;
mod tunnel;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Keep the file writer alive for the whole run so buffered lines are flushed on exit.
    let _log_guard = if args.logs_to_stderr() {
        logging::init_stderr()
    } else {
        let dir = args.log_dir.clone().unwrap_or_else(logging::default_log_dir);
        logging::init_file(&dir)?
    };

    cli::run(args).await
}
