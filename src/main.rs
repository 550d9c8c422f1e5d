use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knowledge_weaver::{
    clients::{LlmClient, OpenAiClient},
    config::Config,
    http::start_http_server,
    orchestrator::{ArticleGenerator, GenerationSettings},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "knowledge-weaver", about = "Outline-then-sections knowledge article generator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate one article and print the JSON result to stdout
    Generate {
        #[arg(long)]
        topic: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("knowledge_weaver=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load().context("Failed to load configuration")?;

    let client: Arc<dyn LlmClient> =
        Arc::new(OpenAiClient::new(&config.llm).context("Failed to build LLM client")?);
    let generator = Arc::new(ArticleGenerator::new(
        client,
        GenerationSettings::from_config(&config),
    ));

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            info!(
                "Starting knowledge-weaver (provider={}, model={})",
                config.llm.provider, config.llm.model
            );
            start_http_server(generator, &config.server).await?;
        }
        Command::Generate { topic } => {
            let response = generator.respond(&topic).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
