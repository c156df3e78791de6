#![forbid(unsafe_code)]

//! One-shot lookup: resolve a link or id, fetch it, and print the adapted
//! item as JSON. Handy for checking which upstream currently answers.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tikembed::{
    TikTokClient,
    config::{DEFAULT_CONFIG_PATH, load_runtime_config_from},
    http::UreqTransport,
    upstream::{SourceKind, parse_source_order},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Look up a TikTok item and print its adapted details.")]
struct Cli {
    #[arg(value_name = "URL_OR_ID", help = "Numeric id, full video URL or short link")]
    input: String,
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(
        long = "sources",
        value_name = "LIST",
        help = "Comma-separated source order, e.g. public,embedded"
    )]
    sources: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn source_order(cli: &Cli, configured: Vec<SourceKind>) -> Result<Vec<SourceKind>> {
    match &cli.sources {
        Some(list) => parse_source_order(list).map_err(|err| anyhow!("--sources: {err}")),
        None => Ok(configured),
    }
}

fn run(cli: &Cli) -> Result<String> {
    let config = load_runtime_config_from(&cli.config)?;
    let order = source_order(cli, config.source_order.clone())?;

    let transport = Arc::new(UreqTransport::new(config.upstream_timeout));
    let client = TikTokClient::new(transport).with_source_order(order);

    let item = client
        .details(&cli.input)
        .map_err(|err| anyhow!("{}: {err}", err.code()))?
        .ok_or_else(|| anyhow!("UNKNOWN_ITEM: no source returned {}", cli.input))?;

    serde_json::to_string_pretty(&item).context("serializing item details")
}
