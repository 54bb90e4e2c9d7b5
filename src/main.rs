use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walletfeed::config::Config;
use walletfeed::models::NetworkId;
use walletfeed::providers::{configured_asset, FileAsset, ProviderOrderingStore};

#[derive(Parser)]
#[command(name = "walletfeed")]
#[command(about = "Inspect the wallet feed configuration and provider ordering")]
struct Cli {
    /// Path to config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved configuration
    Config,

    /// List providers in failover order
    Providers {
        /// Only show this network
        network: Option<String>,
    },

    /// Validate a provider ordering document
    CheckProviders {
        /// Path to the JSON document
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)?;

    match cli.command {
        Command::Config => {
            println!("# {}", config_path.display());
            print!(
                "{}",
                toml::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
        Command::Providers { network } => {
            let store = ProviderOrderingStore::new(configured_asset(
                config.providers_path.as_deref(),
            ));
            let ordering = store.get_config_sync()?;

            let selected: Vec<_> = match &network {
                Some(id) => {
                    let id = NetworkId::new(id.as_str());
                    let providers = ordering
                        .providers(&id)
                        .with_context(|| format!("No providers configured for network {id}"))?;
                    vec![(id, providers)]
                }
                None => ordering
                    .iter()
                    .map(|(id, providers)| (id.clone(), providers))
                    .collect(),
            };

            for (id, providers) in selected {
                println!("{id}");
                for provider in providers {
                    println!(
                        "  {:>3}  {:<8} {}",
                        provider.priority,
                        format!("{:?}", provider.provider_type).to_lowercase(),
                        provider.url
                    );
                }
            }
        }
        Command::CheckProviders { path } => {
            let store = ProviderOrderingStore::new(FileAsset::new(&path));
            let ordering = store
                .get_config_sync()
                .with_context(|| format!("Invalid provider document: {}", path.display()))?;
            println!(
                "{}: ok ({} networks, {} providers)",
                path.display(),
                ordering.network_count(),
                ordering.provider_count()
            );
        }
    }

    Ok(())
}
