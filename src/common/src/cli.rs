use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared by promtsdb binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Common subcommands
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the service (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    /// Default filter directive for the given CLI flags
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments; `RUST_LOG` takes precedence
    pub fn init_logging(args: &CommonArgs) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("promtsdb configuration:");
            println!("=======================");
            println!("Listen address: {}", config.server.listen_addr);
            println!("OpenTSDB URL: {}", config.opentsdb.url);
            println!("OpenTSDB timeout: {:?}", config.opentsdb.timeout);
            println!("Empty tag placeholder: {}", config.opentsdb.empty_tag_value);
            match config.opentsdb.max_concurrent_queries {
                Some(limit) => println!("Max concurrent queries: {limit}"),
                None => println!("Max concurrent queries: unbounded"),
            }
            println!("HTTP connect timeout: {:?}", config.http.connect_timeout);
            println!("HTTP TCP keepalive: {:?}", config.http.tcp_keepalive);
            println!("HTTP pool idle timeout: {:?}", config.http.pool_idle_timeout);
            println!(
                "Accept invalid TLS certificates: {}",
                config.http.accept_invalid_certs
            );
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");

        let url = url::Url::parse(&config.opentsdb.url)
            .with_context(|| format!("Invalid OpenTSDB URL: {}", config.opentsdb.url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("OpenTSDB URL must use http or https, got {}", url.scheme());
        }

        if config.opentsdb.timeout.is_zero() {
            anyhow::bail!("OpenTSDB timeout must be greater than zero");
        }

        if config.opentsdb.max_concurrent_queries == Some(0) {
            anyhow::bail!("max_concurrent_queries must be at least 1 when set");
        }

        if config.opentsdb.empty_tag_value.is_empty() {
            anyhow::bail!("empty_tag_value cannot be empty");
        }

        if config.server.listen_addr.is_empty() {
            anyhow::bail!("Listen address cannot be empty");
        }

        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle common CLI commands that don't require starting the service
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}
