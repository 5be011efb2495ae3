//! Earshot CLI entry point.

use anyhow::Result;
use clap::Parser;
use earshot::cli::{commands, Cli, Commands};
use earshot::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&Settings::expand_path(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging; -v overrides the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("earshot={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    let config_path = cli.config.as_deref();

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, config_path).await?;
        }

        Commands::Ingest { input } => {
            commands::run_ingest(input, settings).await?;
        }

        Commands::Ask { input, question, top_k } => {
            commands::run_ask(input, question, *top_k, settings).await?;
        }

        Commands::Search { input, query, limit } => {
            commands::run_search(input, query, *limit, settings).await?;
        }

        Commands::Chat { input } => {
            commands::run_chat(input.as_deref(), settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Forget { content_id } => {
            commands::run_forget(content_id, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
