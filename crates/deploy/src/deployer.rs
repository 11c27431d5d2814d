//! Contract creation on zkSync through the `ContractDeployer` system contract.

use std::future::Future;
use std::time::Duration;

use alloy_core::{
    primitives::{Address, B256, Bytes, U256, address},
    sol,
    sol_types::SolCall,
};
use alloy_signer::SignerSync;
use anyhow::{Context, Result};

use crate::{
    artifact::ContractArtifact,
    config::ContractConfig,
    eip712::{DEFAULT_GAS_PER_PUBDATA, EIP712_TX_TYPE, Eip712Transaction},
    rpc::{self, RpcClient},
    signer::Accounts,
};

/// The zkSync `ContractDeployer` system contract.
pub const CONTRACT_DEPLOYER_ADDRESS: Address =
    address!("0000000000000000000000000000000000008006");

/// Maximum time to wait for the creation transaction to be included.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

sol! {
    interface IContractDeployer {
        function create(bytes32 _salt, bytes32 _bytecodeHash, bytes _input) external payable returns (address);
    }
}

/// A confirmed contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    pub contract_address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    /// The signed creation transaction. Empty when unavailable.
    pub raw_payload: Bytes,
}

/// Submits contract creation transactions.
pub trait ContractDeployer {
    /// Deploy `contract` with ABI-encoded `constructor_args` and wait for confirmation.
    fn deploy(
        &self,
        contract: &ContractConfig,
        constructor_args: &Bytes,
    ) -> impl Future<Output = Result<DeploymentResult>> + Send;
}

/// Deploys zksolc artifacts with signed EIP-712 transactions.
#[derive(Debug, Clone)]
pub struct ZkSyncDeployer {
    rpc: RpcClient,
    accounts: Accounts,
}

impl ZkSyncDeployer {
    pub fn new(rpc: RpcClient, accounts: Accounts) -> Self {
        Self { rpc, accounts }
    }

    /// Calldata for `ContractDeployer.create` with a zero salt.
    pub fn create_calldata(bytecode_hash: B256, constructor_args: &Bytes) -> Bytes {
        IContractDeployer::createCall {
            _salt: B256::ZERO,
            _bytecodeHash: bytecode_hash,
            _input: constructor_args.clone(),
        }
        .abi_encode()
        .into()
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<rpc::TransactionReceipt> {
        let client = &self.rpc;
        rpc::wait_until("deployment receipt", RECEIPT_TIMEOUT, move || async move {
            client
                .transaction_receipt(tx_hash)
                .await?
                .context("Receipt not available yet")
        })
        .await
    }
}

impl ContractDeployer for ZkSyncDeployer {
    async fn deploy(
        &self,
        contract: &ContractConfig,
        constructor_args: &Bytes,
    ) -> Result<DeploymentResult> {
        let wallet = self.accounts.deployer()?;
        let from = wallet.address();

        let artifact_path = contract.artifact_path();
        let artifact = ContractArtifact::load(&artifact_path)?;
        let bytecode_hash = artifact.bytecode_hash()?;
        let calldata = Self::create_calldata(bytecode_hash, constructor_args);

        let chain_id = self.rpc.chain_id().await.context("Failed to fetch chain ID")?;
        let nonce = self
            .rpc
            .pending_nonce(from)
            .await
            .context("Failed to fetch deployer nonce")?;

        let fee = self
            .rpc
            .estimate_fee(serde_json::json!({
                "from": from,
                "to": CONTRACT_DEPLOYER_ADDRESS,
                "data": calldata,
                "value": U256::ZERO,
                "type": format!("0x{:x}", EIP712_TX_TYPE),
                "eip712Meta": {
                    "gasPerPubdata": U256::from(DEFAULT_GAS_PER_PUBDATA),
                    "factoryDeps": [artifact.bytecode.to_vec()],
                },
            }))
            .await
            .context("Failed to estimate deployment fee")?;

        tracing::debug!(
            chain_id,
            nonce,
            gas_limit = %fee.gas_limit,
            max_fee_per_gas = %fee.max_fee_per_gas,
            %bytecode_hash,
            "Prepared deployment transaction"
        );

        let tx = Eip712Transaction {
            chain_id,
            nonce,
            from,
            to: CONTRACT_DEPLOYER_ADDRESS,
            gas_limit: fee.gas_limit,
            gas_per_pubdata: fee
                .gas_per_pubdata_limit
                .unwrap_or(U256::from(DEFAULT_GAS_PER_PUBDATA)),
            max_fee_per_gas: fee.max_fee_per_gas,
            max_priority_fee_per_gas: fee.max_priority_fee_per_gas,
            value: U256::ZERO,
            data: calldata,
            factory_deps: vec![artifact.bytecode.clone()],
        };

        let signature = wallet
            .sign_hash_sync(&tx.signing_hash()?)
            .context("Failed to sign deployment transaction")?;
        let raw = tx.encode_signed(&signature);

        let tx_hash = self
            .rpc
            .send_raw_transaction(&raw)
            .await
            .context("Failed to submit deployment transaction")?;
        tracing::info!(%tx_hash, contract = %contract.name, "Deployment transaction submitted");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            anyhow::bail!("Deployment transaction {} reverted", tx_hash);
        }

        let contract_address = receipt
            .contract_address
            .with_context(|| format!("Receipt of {} has no contract address", tx_hash))?;
        let block_number = receipt
            .block_number
            .with_context(|| format!("Receipt of {} has no block number", tx_hash))?
            .to();

        Ok(DeploymentResult {
            contract_address,
            tx_hash: receipt.transaction_hash,
            block_number,
            raw_payload: raw,
        })
    }
}
