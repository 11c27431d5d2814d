use std::path::PathBuf;

use clap::{Parser, Subcommand};
use placeholder_deploy::{Address, CONFIG_FILENAME};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "deploy-placeholder")]
#[command(
    author,
    version,
    about = "Deploy and verify PlaceholderContract on zkSync-based networks"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "DEPLOY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to deploy to, as named in the configuration.
    ///
    /// If not provided, the configuration's default network is used.
    #[arg(short, long, global = true, env = "DEPLOY_NETWORK")]
    pub network: Option<String>,

    /// Path to the configuration file.
    ///
    /// If not provided, ./Deploy.toml is used when present.
    #[arg(long, alias = "conf", global = true, env = "DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Private key of the deployer account.
    #[arg(long, env = "WALLET_PRIVATE_KEY", hide = true, hide_env_values = true)]
    pub private_key: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Deploy the contract, then verify it on non-local networks (default).
    Deploy,

    /// Verify an already deployed contract.
    Verify {
        /// Address of the deployed contract.
        address: Address,
    },

    /// Write the default configuration file.
    Init {
        /// Where to write the configuration.
        #[arg(long, default_value = CONFIG_FILENAME)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}
