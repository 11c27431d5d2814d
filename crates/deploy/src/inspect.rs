//! Read-back of the deployed contract's public state.

use std::future::Future;

use alloy_core::{
    primitives::{Address, U256},
    sol,
    sol_types::SolCall,
};
use anyhow::{Context, Result};

use crate::rpc::RpcClient;

sol! {
    interface IPlaceholderContract {
        function PLACEHOLDER_PRICE() external view returns (uint256);
        function owner() external view returns (address);
        function getNextPlaceholderId() external view returns (uint256);
        function getContractBalance() external view returns (uint256);
    }
}

/// Public state of a freshly deployed `PlaceholderContract`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    /// Price of one placeholder, in wei.
    pub placeholder_price: U256,
    pub owner: Address,
    pub next_placeholder_id: U256,
    /// Contract balance, in wei.
    pub contract_balance: U256,
}

/// Reads a deployed contract's public state.
pub trait ContractInspector {
    fn read_state(&self, address: Address) -> impl Future<Output = Result<ContractState>> + Send;
}

/// Reads state with `eth_call`.
#[derive(Debug, Clone)]
pub struct RpcInspector {
    rpc: RpcClient,
}

impl RpcInspector {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    async fn call<C: SolCall + Send>(&self, address: Address, call: C) -> Result<C::Return> {
        let output = self
            .rpc
            .eth_call(address, call.abi_encode().into())
            .await
            .with_context(|| format!("Failed to call {}", C::SIGNATURE))?;

        // Calls to an address without the function return empty data.
        if output.is_empty() {
            anyhow::bail!("{} returned no data", C::SIGNATURE);
        }

        C::abi_decode_returns(&output)
            .with_context(|| format!("Failed to decode {} output", C::SIGNATURE))
    }
}

impl ContractInspector for RpcInspector {
    async fn read_state(&self, address: Address) -> Result<ContractState> {
        Ok(ContractState {
            placeholder_price: self
                .call(address, IPlaceholderContract::PLACEHOLDER_PRICECall {})
                .await?,
            owner: self
                .call(address, IPlaceholderContract::ownerCall {})
                .await?,
            next_placeholder_id: self
                .call(address, IPlaceholderContract::getNextPlaceholderIdCall {})
                .await?,
            contract_balance: self
                .call(address, IPlaceholderContract::getContractBalanceCall {})
                .await?,
        })
    }
}
