//! placeholder-deploy - Deployment library for `PlaceholderContract` on zkSync rollups.
//!
//! This crate deploys a compiled contract to a zkSync-based network, reads back
//! its initial state and registers its source with the network's explorer.

pub mod artifact;
pub mod config;
pub mod deployer;
pub mod eip712;
pub mod inspect;
pub mod orchestrator;
pub mod report;
pub mod rpc;
pub mod signer;
pub mod verify;

pub use alloy_core::primitives::Address;
pub use config::{
    CONFIG_FILENAME, CompilerConfig, ContractConfig, DEFAULT_NETWORK, DeployConfig, Network,
    NetworkConfig,
};
pub use deployer::{ContractDeployer, DeploymentResult, ZkSyncDeployer};
pub use inspect::{ContractInspector, ContractState, RpcInspector};
pub use orchestrator::{Orchestrator, RunReport, VERIFICATION_DELAY};
pub use rpc::RpcClient;
pub use signer::{Accounts, DeploymentContext, LocalSignerProvider, PRIVATE_KEY_ENV, SignerProvider};
pub use verify::{
    VerificationOutcome, VerificationRequest, VerificationService, ZkSyncVerifier,
};
