//! Signing accounts and the signer provider.

use std::future::Future;
use std::str::FromStr;

use alloy_core::primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

use crate::rpc::RpcClient;

/// Environment variable holding the deployer's private key.
pub const PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";

/// Who deploys, with how much, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub signer_address: Address,
    pub signer_balance: U256,
    pub network_name: String,
}

/// Yields the account used to submit transactions.
pub trait SignerProvider {
    /// Resolve the signing account and its balance.
    ///
    /// Fails when no account is configured.
    fn resolve(&self) -> impl Future<Output = Result<DeploymentContext>> + Send;
}

/// The configured signing accounts. Empty when no key is configured.
#[derive(Debug, Clone, Default)]
pub struct Accounts(Vec<PrivateKeySigner>);

impl Accounts {
    /// Build the account set from an optional hex private key.
    ///
    /// A missing or blank key yields an empty set; a malformed key is an error.
    pub fn from_private_key(key: Option<&str>) -> Result<Self> {
        let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) else {
            return Ok(Self::default());
        };

        let signer = PrivateKeySigner::from_str(key)
            .with_context(|| format!("Invalid private key in {}", PRIVATE_KEY_ENV))?;
        Ok(Self(vec![signer]))
    }

    pub fn from_signers(signers: Vec<PrivateKeySigner>) -> Self {
        Self(signers)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The deployer account.
    pub fn deployer(&self) -> Result<&PrivateKeySigner> {
        self.0.first().with_context(|| {
            format!(
                "No signer available: set {} to the deployer's private key",
                PRIVATE_KEY_ENV
            )
        })
    }
}

/// Signer provider backed by local private keys and a JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct LocalSignerProvider {
    accounts: Accounts,
    rpc: RpcClient,
    network_name: String,
}

impl LocalSignerProvider {
    pub fn new(accounts: Accounts, rpc: RpcClient, network_name: impl Into<String>) -> Self {
        Self {
            accounts,
            rpc,
            network_name: network_name.into(),
        }
    }
}

impl SignerProvider for LocalSignerProvider {
    async fn resolve(&self) -> Result<DeploymentContext> {
        let signer_address = self.accounts.deployer()?.address();
        let signer_balance = self
            .rpc
            .balance(signer_address)
            .await
            .with_context(|| format!("Failed to fetch balance of {}", signer_address))?;

        Ok(DeploymentContext {
            signer_address,
            signer_balance,
            network_name: self.network_name.clone(),
        })
    }
}
