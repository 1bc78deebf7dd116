//! dailyphrase - daily positive phrase service
//!
//! Command-line entry point for generating, scheduling and serving
//! the daily phrase.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dailyphrase::cli::Cli;
use dailyphrase::config::{self, Config};
use dailyphrase::Result;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Load configuration differently based on command
    let config = match load(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(cli.debug || config.debug, cli.log_json || config.log_json);

    // Execute the command
    if let Err(e) = run(cli, config).await {
        error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn load(cli: &Cli) -> Result<Config> {
    let path = cli.config_file.as_deref();
    if cli.is_config_command() {
        // For config commands, load without validation
        config::load_config_no_validation(path).await
    } else {
        config::load_config(path).await
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    info!("Starting dailyphrase");

    cli.execute(config).await?;

    Ok(())
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "dailyphrase=debug" } else { "dailyphrase=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
