use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dealhunter_scraper::{Engine, SessionProvider};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dealhunter-cli")]
#[command(about = "Extract product data and find the same product at other retailers")]
struct Cli {
    /// YAML file replacing the built-in retailer table
    #[arg(long, global = true, env = "DEALHUNTER_RETAILERS_PATH")]
    retailers: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract name, price, store, availability and image from a product page
    Extract { url: String },
    /// Re-extract a product page and compare against a prior price
    CheckPrice {
        url: String,
        /// Previously recorded price, e.g. 24.99
        #[arg(long)]
        current_price: Option<String>,
    },
    /// List the product images found on a page
    Images { url: String },
    /// Search competing retailers for a product name
    Search {
        product_name: String,
        /// Store the product was found at; it is skipped
        #[arg(long)]
        current_store: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = dealhunter_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.env.wants_ansi_logs())
        .init();

    let retailers_path = cli.retailers.as_deref().or(config.retailers_path.as_deref());
    let registry = dealhunter_core::load_retailers(retailers_path)
        .context("failed to load retailer profiles")?;
    tracing::debug!(
        env = %config.env,
        retailers = registry.retailers().len(),
        model_fallback = config.llm_api_key.is_some(),
        "engine configured"
    );
    let engine = Engine::from_config(&config, registry)?;

    let output = run(&engine, cli.command).await?;
    println!("{output}");
    Ok(())
}

async fn run<P: SessionProvider>(engine: &Engine<P>, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Extract { url } => {
            let details = engine
                .extract_product(&url)
                .await
                .with_context(|| format!("failed to extract {url}"))?;
            pretty(&details)
        }
        Commands::CheckPrice { url, current_price } => {
            let check = engine
                .check_price(&url, current_price.as_deref())
                .await
                .with_context(|| format!("failed to check price for {url}"))?;
            pretty(&check)
        }
        Commands::Images { url } => {
            let images = engine
                .alternative_images(&url)
                .await
                .with_context(|| format!("failed to collect images from {url}"))?;
            pretty(&images)
        }
        Commands::Search {
            product_name,
            current_store,
        } => {
            let results = engine
                .search_product(&product_name, current_store.as_deref())
                .await
                .with_context(|| format!("search for \"{product_name}\" failed"))?;
            pretty(&results)
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize response")
}
