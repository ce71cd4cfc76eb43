mod cli;
mod format;
mod geo;
mod logging;
mod model;
mod orchestrator;
mod source;
mod text_summary;
mod track;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.is_headless();
    logging::init(args.verbose, args.log_file.as_deref(), !is_non_tui)?;

    match cli::run(args).await {
        Ok(()) => {
            // A blocked stdin reader must not keep a headless process alive.
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run-tracker failed");
            Err(e)
        }
    }
}
