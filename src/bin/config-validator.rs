//! # Task Market Configuration Validator
//!
//! Command-line tool for validating task market configuration before a
//! service is pointed at a ledger. Loads the same layered configuration the
//! library does (defaults, TOML file, `MARKET__` environment variables),
//! validates it and prints the result with secrets masked.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use taskmarket_core::config::MarketConfig;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate task market configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: ./taskmarket.toml or ./config/taskmarket.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and print the sanitized configuration
    Validate,

    /// Print the built-in defaults
    Defaults,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match cli.command {
        Some(Commands::Defaults) => show_defaults(),
        Some(Commands::Validate) | None => validate(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            println!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating task market configuration");
    if let Some(path) = &cli.config {
        println!("Config file: {}", path.display());
    }

    let config = match &cli.config {
        Some(path) => MarketConfig::load_from(Some(path.as_path())),
        None => MarketConfig::load(),
    }
    .context("failed to load configuration")?;
    config.validate().context("configuration is invalid")?;

    println!("✅ Configuration loaded and validated");
    println!("   - Channel: {}", config.ledger.channel);
    println!("   - Chaincode: {}", config.ledger.chaincode);
    println!("   - Registration policy: {:?}", config.registration);
    println!(
        "   - Circuit breaker: {}",
        if config.circuit_breaker.enabled { "enabled" } else { "disabled" }
    );
    println!("{}", serde_json::to_string_pretty(&config.sanitized())?);
    Ok(())
}

fn show_defaults() -> anyhow::Result<()> {
    println!("📋 Built-in defaults");
    let defaults = MarketConfig::default();
    println!("{}", serde_json::to_string_pretty(&defaults.sanitized())?);
    Ok(())
}
