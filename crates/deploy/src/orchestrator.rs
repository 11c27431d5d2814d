//! The deployment run: deploy, read back, wait, verify, report.

use std::io::Write;
use std::time::Duration;

use alloy_core::primitives::Bytes;
use anyhow::Result;

use crate::{
    config::{ContractConfig, Network},
    deployer::{ContractDeployer, DeploymentResult},
    inspect::{ContractInspector, ContractState},
    report,
    signer::{DeploymentContext, SignerProvider},
    verify::{VerificationOutcome, VerificationRequest, VerificationService},
};

/// Time given to the explorer to index a new contract before verification.
pub const VERIFICATION_DELAY: Duration = Duration::from_millis(45_000);

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub context: DeploymentContext,
    pub deployment: DeploymentResult,
    /// `None` when the read-back failed.
    pub state: Option<ContractState>,
    pub verification: VerificationOutcome,
}

/// Drives a single deployment with its collaborators.
pub struct Orchestrator<S, D, I, V> {
    network: Network,
    contract: ContractConfig,
    signer: S,
    deployer: D,
    inspector: I,
    verifier: V,
    verification_delay: Duration,
}

impl<S, D, I, V> Orchestrator<S, D, I, V>
where
    S: SignerProvider,
    D: ContractDeployer,
    I: ContractInspector,
    V: VerificationService,
{
    pub fn new(
        network: Network,
        contract: ContractConfig,
        signer: S,
        deployer: D,
        inspector: I,
        verifier: V,
    ) -> Self {
        Self {
            network,
            contract,
            signer,
            deployer,
            inspector,
            verifier,
            verification_delay: VERIFICATION_DELAY,
        }
    }

    /// Override the wait between deployment and verification.
    pub fn with_verification_delay(mut self, delay: Duration) -> Self {
        self.verification_delay = delay;
        self
    }

    /// Run the deployment, writing the console report to `out`.
    ///
    /// Fails only when the signer cannot be resolved or the deployment fails.
    /// Read-back, verification and console write failures are logged and absorbed.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<RunReport> {
        let context = self.signer.resolve().await?;
        tracing::info!(
            network = %context.network_name,
            deployer = %context.signer_address,
            balance = %context.signer_balance,
            "Deploying {}", self.contract.name
        );

        let constructor_args = Bytes::new();
        let deployment = self
            .deployer
            .deploy(&self.contract, &constructor_args)
            .await?;
        let address = deployment.contract_address;
        tracing::info!(%address, tx_hash = %deployment.tx_hash, "{} deployed", self.contract.name);

        let state = match self.inspector.read_state(address).await {
            Ok(state) => {
                printed("contract state", report::write_contract_state(out, &state));
                Some(state)
            }
            Err(e) => {
                tracing::warn!(
                    %address,
                    error = %format!("{:#}", e),
                    "Contract deployed but could not read initial values"
                );
                None
            }
        };

        tracing::info!(
            delay = ?self.verification_delay,
            "Waiting before verification"
        );
        tokio::time::sleep(self.verification_delay).await;

        let verification = if self.network.is_local() {
            tracing::info!(network = %self.network.name, "Skipping verification on local network");
            VerificationOutcome::Skipped
        } else {
            self.verify(out, &deployment, constructor_args).await
        };

        printed(
            "deployment summary",
            report::write_summary(out, &self.network, &self.contract.name, &context, &deployment),
        );
        printed(
            "usage",
            report::write_usage(out, &self.network, &context, address),
        );

        Ok(RunReport {
            context,
            deployment,
            state,
            verification,
        })
    }

    async fn verify<W: Write>(
        &self,
        out: &mut W,
        deployment: &DeploymentResult,
        constructor_arguments: Bytes,
    ) -> VerificationOutcome {
        let address = deployment.contract_address;
        tracing::info!(%address, "Verifying contract");

        let request = VerificationRequest {
            address,
            contract: self.contract.fully_qualified(),
            constructor_arguments,
            bytecode: deployment.raw_payload.clone(),
        };
        let outcome = VerificationOutcome::from_result(self.verifier.verify(&request).await);

        match &outcome {
            VerificationOutcome::Success => {
                tracing::info!(%address, "Contract verified successfully");
            }
            VerificationOutcome::AlreadyVerified => {
                tracing::info!(%address, "Contract is already verified");
            }
            VerificationOutcome::Failed(detail) => {
                tracing::error!(%address, error = %detail, "Verification failed");
                printed(
                    "manual verification",
                    report::write_manual_verification(out, &self.network, address),
                );
            }
            VerificationOutcome::Skipped => {}
        }

        outcome
    }
}

/// Console output past deployment is best-effort.
fn printed(block: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(block, error = %format!("{:#}", e), "Failed to print report");
    }
}
