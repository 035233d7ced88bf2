//! `wateremu` binary.

use clap::Parser;
use wateremu_runner::cli::Cli;
use wateremu_runner::logging::init_logging;
use wateremu_runner::{print_service_table, run};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    print_service_table(&config);

    if let Err(e) = run(config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
