use adapter::{AdapterState, create_router};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use opentsdb::Client;

#[derive(Parser)]
#[command(name = "promtsdb")]
#[command(about = "Prometheus remote storage adapter for OpenTSDB")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long, help = "Listen address, overrides server.listen_addr")]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<PromTsdbCommands>,
}

#[derive(Subcommand)]
enum PromTsdbCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for PromTsdbCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Start)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    let mut config = utils::load_config(cli.common.config.as_ref())?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }

    let command = cli.command.unwrap_or_default();
    let PromTsdbCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(()); // Command handled, exit early
    }

    utils::validate_config(&config)?;

    log::info!("Loaded configuration:");
    log::info!("  OpenTSDB URL: {}", config.opentsdb.url);
    log::info!("  OpenTSDB timeout: {:?}", config.opentsdb.timeout);

    let client = Client::new(&config.opentsdb, &config.http)
        .context("Failed to create OpenTSDB client")?;
    log::info!("Created {} client", client.name());

    let app = create_router(AdapterState::new(client));

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    log::info!("promtsdb stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received shutdown signal, stopping"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {e}"),
    }
}
