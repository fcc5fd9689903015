use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::runtime::Runtime;

use autoclick::cli::{Cli, Commands};
use autoclick::run;

fn main() -> Result<()> {
    let cli = Cli::parse();
    autoclick_config::logging::init_logging(cli.debug);
    log::info!("starting autoclick");

    let runtime = Arc::new(Runtime::new()?);

    let result = runtime.block_on(async {
        match cli.command_or_default() {
            Commands::Run { config } => run::run(config).await,
            Commands::ListWindows => run::list_windows(),
            Commands::ListMonitors => run::list_monitors(),
            Commands::ValidateConfig { config } => run::validate_config(config),
        }
    });

    log::info!("shutting down Tokio runtime");
    match Arc::try_unwrap(runtime) {
        Ok(rt) => {
            rt.shutdown_timeout(std::time::Duration::from_secs(2));
            log::info!("Tokio runtime shutdown complete");
        }
        Err(arc) => {
            log::warn!(
                "runtime still has {} strong references, forcing shutdown",
                Arc::strong_count(&arc)
            );
        }
    }

    result
}
