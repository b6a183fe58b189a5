use anyhow::Result;
use clap::{Parser, Subcommand};
use polyglot_cms::config::Config;
use polyglot_cms::gateway::OpenAiGateway;
use polyglot_cms::{server, translate};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "polyglot-cms", about = "Locale-aware template server with LLM translation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve static files and localized templates over HTTP
    Web,
    /// Translate stale templates into every allowed locale
    Translate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("polyglot_cms=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env()?;

    match cli.command {
        Command::Web => {
            info!("Starting CMS web server");
            server::run(Arc::new(config)).await?;
        }
        Command::Translate => {
            info!("Starting translation run");
            let gateway = OpenAiGateway::from_config(&config)?;
            translate::run(&config, &gateway).await?;
            info!("Translation run completed");
        }
    }

    Ok(())
}
