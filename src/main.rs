//! mws-payments - command-line caller for the Off-Amazon Payments MWS API.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mws_payments::config::Config;
use mws_payments::payments::{PaymentsApi, PaymentsClient};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "mws-payments",
    version,
    about = "Signed caller for the Amazon MWS Off-Amazon Payments API"
)]
struct Cli {
    /// MWS seller (merchant) id
    #[arg(long, global = true, env = "MWS_SELLER_ID")]
    seller_id: Option<String>,

    /// AWS access key id
    #[arg(long, global = true, env = "MWS_ACCESS_KEY")]
    access_key: Option<String>,

    /// AWS secret key
    #[arg(long, global = true, env = "MWS_SECRET_KEY")]
    secret_key: Option<String>,

    /// Use the sandbox endpoint
    #[arg(
        long,
        global = true,
        env = "MWS_SANDBOX",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    sandbox: bool,

    /// Path to a TOML credentials file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call an API action and print the response as JSON
    Call {
        /// Action name, e.g. GetOrderReferenceDetails
        action: String,

        /// Action parameter as KEY=VALUE (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Call { action, params } => {
            let pairs = params.iter().map(|p| parse_pair(p)).collect::<Result<Vec<_>>>()?;
            let borrowed: Vec<(&str, &str)> =
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

            let client = PaymentsClient::new(config)?;
            let data = client.call(&action, &borrowed).await?;

            println!("{}", serde_json::to_string_pretty(&Value::Object(data))?);
        }
    }

    Ok(())
}

/// Builds the config from, in order of precedence: CLI flags (which clap
/// also backs with env vars), then a TOML credentials file.
fn resolve_config(cli: &Cli) -> Result<Config> {
    if let Some(path) = &cli.config {
        let mut config = Config::from_file(path)?;
        if let Some(seller_id) = &cli.seller_id {
            config.seller_id = seller_id.clone();
        }
        if let Some(access_key) = &cli.access_key {
            config.access_key = access_key.clone();
        }
        if let Some(secret_key) = &cli.secret_key {
            config.secret_key = secret_key.clone();
        }
        if cli.sandbox {
            config.sandbox = true;
        }
        return Ok(config);
    }

    match (&cli.seller_id, &cli.access_key, &cli.secret_key) {
        (Some(seller_id), Some(access_key), Some(secret_key)) => {
            Ok(Config::new(seller_id, access_key, secret_key, cli.sandbox))
        }
        _ => bail!(
            "Missing credentials: pass --seller-id/--access-key/--secret-key, \
             set MWS_SELLER_ID/MWS_ACCESS_KEY/MWS_SECRET_KEY, or use --config"
        ),
    }
}

fn parse_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid parameter (expected KEY=VALUE): {raw}"))?;
    if key.is_empty() {
        bail!("Invalid parameter (empty key): {raw}");
    }
    Ok((key.to_string(), value.to_string()))
}
