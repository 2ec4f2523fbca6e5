#![deny(unsafe_code)]

//! llmrelay CLI: inspect configuration and send one-off requests through the
//! relay using credentials from the environment.

mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use llmrelay_config::AppConfig;
use llmrelay_core::session::TracingEventSink;
use llmrelay_core::{
    EnvCredentialProvider, LogicalModel, ModelResolver, build_info, regional_prefix,
};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::terminal::TerminalNotifier;

/// llmrelay: authenticated relay for LLM backends.
#[derive(Parser, Debug)]
#[command(name = "llmrelay", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "llmrelay.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Print the Bedrock inference-profile prefix for an AWS region.
    Region { region: String },

    /// Show which backend and model id a logical model resolves to.
    Resolve {
        /// `haiku` or `sonnet`.
        model: LogicalModel,
    },

    /// Send a single user message and print the raw JSON response.
    Send {
        model: LogicalModel,
        prompt: String,

        #[arg(long, default_value_t = 1024)]
        max_tokens: u32,
    },

    /// Print build information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(version = %build_info::version_string(), "llmrelay starting");
    if !found {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Region { region } => println!("{}", regional_prefix(&region)),
        Commands::Resolve { model } => cmd_resolve(&config, model).await?,
        Commands::Send {
            model,
            prompt,
            max_tokens,
        } => cmd_send(&config, model, &prompt, max_tokens).await?,
        Commands::Version => println!("llmrelay {}", build_info::long_version()),
    }

    Ok(())
}

/// `-v` flags override the configured level.
fn log_filter(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

fn cmd_config(path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to render config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", path.display());
    }
    Ok(())
}

fn resolver(config: &AppConfig) -> Result<ModelResolver> {
    let credentials = EnvCredentialProvider::from_config(config)?;
    Ok(ModelResolver::from_config(
        config,
        Arc::new(credentials),
        Arc::new(TracingEventSink),
        Arc::new(TerminalNotifier),
    )?)
}

async fn cmd_resolve(config: &AppConfig, model: LogicalModel) -> Result<()> {
    let client = resolver(config)?.model_client(model).await?;
    println!("login method: {}", client.handle().login_method());
    println!("endpoint:     {}", client.endpoint());
    println!("model:        {}", client.model_id());
    Ok(())
}

fn message_body(prompt: &str, max_tokens: u32) -> serde_json::Value {
    json!({
        "max_tokens": max_tokens,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

async fn cmd_send(
    config: &AppConfig,
    model: LogicalModel,
    prompt: &str,
    max_tokens: u32,
) -> Result<()> {
    let client = resolver(config)?.model_client(model).await?;
    info!(model = client.model_id(), "sending message");

    let response = client.send(message_body(prompt, max_tokens)).await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        bail!("backend returned {status}: {text}");
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
