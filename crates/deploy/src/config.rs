//! Deployment configuration: target networks, compiler toolchain and contract location.
//!
//! Configuration is layered with figment: built-in defaults, then an optional
//! `Deploy.toml` file, then `DEPLOY_*` environment variables (nested keys are
//! split on `__`, e.g. `DEPLOY_NETWORKS__HARDHAT__URL`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// The default name for the deployment configuration file.
pub const CONFIG_FILENAME: &str = "Deploy.toml";

/// The network used when none is selected.
pub const DEFAULT_NETWORK: &str = "ZKcandyMainnet";

/// Network names that always denote an ephemeral development chain.
pub const LOCAL_NETWORK_NAMES: [&str; 2] = ["hardhat", "localhost"];

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "DEPLOY_";

/// Connection and explorer settings for a named network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the rollup.
    pub url: String,
    /// The underlying base chain (e.g. `mainnet`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_network: Option<String>,
    /// Whether the network is a zkSync-based rollup.
    #[serde(default)]
    pub zksync: bool,
    /// Contract verification API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,
    /// Human-facing block explorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_verify_url: Option<String>,
    /// Enables calls to `verify_url`.
    #[serde(default)]
    pub enable_verify_url: bool,
    /// Marks the network as an ephemeral development chain.
    #[serde(default)]
    pub local: bool,
}

impl NetworkConfig {
    /// The verification endpoint, if verification is enabled for this network.
    pub fn verification_endpoint(&self) -> Option<&str> {
        self.verify_url
            .as_deref()
            .filter(|_| self.enable_verify_url)
    }

    /// Explorer page for an address, if the network has an explorer.
    pub fn explorer_address_url(&self, address: impl std::fmt::Display) -> Option<String> {
        self.browser_verify_url
            .as_deref()
            .map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
    }
}

/// Compiler toolchain settings reported to the verification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// zksolc version, e.g. `v1.5.15`.
    pub zksolc_version: String,
    /// solc version, e.g. `0.8.24`.
    pub solc_version: String,
    pub optimizer_enabled: bool,
    pub codegen: String,
    pub via_ir: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            zksolc_version: "v1.5.15".to_string(),
            solc_version: "0.8.24".to_string(),
            optimizer_enabled: true,
            codegen: "yul".to_string(),
            via_ir: true,
        }
    }
}

/// Location of the contract to deploy and its compiler output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Bare contract name.
    pub name: String,
    /// Source file path relative to the project root.
    pub source: String,
    /// Directory holding the zksolc artifacts.
    pub artifacts_dir: PathBuf,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            name: "PlaceholderContract".to_string(),
            source: "contracts/PlaceholderContract.sol".to_string(),
            artifacts_dir: PathBuf::from("artifacts-zk"),
        }
    }
}

impl ContractConfig {
    /// The module-path-qualified identifier, e.g.
    /// `contracts/PlaceholderContract.sol:PlaceholderContract`.
    pub fn fully_qualified(&self) -> String {
        format!("{}:{}", self.source, self.name)
    }

    /// Path of the compiled artifact JSON.
    pub fn artifact_path(&self) -> PathBuf {
        self.artifacts_dir
            .join(&self.source)
            .join(format!("{}.json", self.name))
    }

    /// Directory of build-info files containing the standard JSON input.
    pub fn build_info_dir(&self) -> PathBuf {
        self.artifacts_dir.join("build-info")
    }
}

/// A network selected by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub config: NetworkConfig,
}

impl Network {
    /// Whether this is an ephemeral development network without an explorer.
    pub fn is_local(&self) -> bool {
        self.config.local || LOCAL_NETWORK_NAMES.contains(&self.name.as_str())
    }

    /// Explorer page for an address on this network.
    pub fn explorer_address_url(&self, address: impl std::fmt::Display) -> Option<String> {
        self.config.explorer_address_url(address)
    }
}

/// Full deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Network used when none is selected on the command line.
    pub default_network: String,
    /// Named network configurations.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Compiler toolchain settings.
    pub compiler: CompilerConfig,
    /// Contract to deploy.
    pub contract: ContractConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            DEFAULT_NETWORK.to_string(),
            NetworkConfig {
                url: "https://rpc.zkcandy.io".to_string(),
                eth_network: Some("mainnet".to_string()),
                zksync: true,
                verify_url: Some("https://contracts.zkcandy.io/contract_verification".to_string()),
                browser_verify_url: Some("https://explorer.zkcandy.io".to_string()),
                enable_verify_url: true,
                local: false,
            },
        );
        networks.insert(
            "hardhat".to_string(),
            NetworkConfig {
                url: "http://127.0.0.1:8011".to_string(),
                eth_network: None,
                zksync: true,
                verify_url: None,
                browser_verify_url: None,
                enable_verify_url: false,
                local: true,
            },
        );

        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            networks,
            compiler: CompilerConfig::default(),
            contract: ContractConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, `Deploy.toml` in the current
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let file = if path.is_dir() {
                    path.join(CONFIG_FILENAME)
                } else {
                    path.to_path_buf()
                };
                if !file.exists() {
                    anyhow::bail!("Configuration file not found: {}", file.display());
                }
                Some(file)
            }
            None => Some(PathBuf::from(CONFIG_FILENAME)).filter(|file| file.exists()),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(ref file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["network", "config", "verbosity"])
                .split("__"),
        );

        figment
            .extract()
            .context("Failed to parse deployment configuration")
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Select a network by name, or the default network.
    pub fn network(&self, name: Option<&str>) -> Result<Network> {
        let name = name.unwrap_or(&self.default_network);
        let config = self.networks.get(name).with_context(|| {
            format!(
                "Unknown network '{}'. Available networks: {}",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?;

        if !config.zksync {
            anyhow::bail!("Network '{}' is not a zkSync network", name);
        }

        url::Url::parse(&config.url)
            .with_context(|| format!("Invalid RPC URL for network '{}': {}", name, config.url))?;
        if let Some(ref verify_url) = config.verify_url {
            url::Url::parse(verify_url).with_context(|| {
                format!("Invalid verification URL for network '{}': {}", name, verify_url)
            })?;
        }

        Ok(Network {
            name: name.to_string(),
            config: config.clone(),
        })
    }
}
