//! deploy-placeholder deploys PlaceholderContract to a zkSync-based rollup and verifies it.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use placeholder_deploy::{
    Accounts, Address, DeployConfig, LocalSignerProvider, Orchestrator, RpcClient, RpcInspector,
    VerificationOutcome, VerificationRequest, VerificationService, ZkSyncDeployer,
    ZkSyncVerifier,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Secrets may come from a local .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Deployment failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command.clone().unwrap_or(Command::Deploy) {
        Command::Deploy => deploy(&cli).await,
        Command::Verify { address } => verify(&cli, address).await,
        Command::Init { path, force } => init(&path, force),
    }
}

async fn deploy(cli: &Cli) -> Result<()> {
    let config = DeployConfig::load(cli.config.as_deref())?;
    let network = config.network(cli.network.as_deref())?;
    let accounts = Accounts::from_private_key(cli.private_key.as_deref())?;
    let rpc = RpcClient::new(&network.config.url)?;

    tracing::info!(
        network = %network.name,
        rpc_url = %network.config.url,
        contract = %config.contract.fully_qualified(),
        "Starting deployment..."
    );

    let verifier = ZkSyncVerifier::for_network(&network, &config.compiler, &config.contract)?;
    let orchestrator = Orchestrator::new(
        network.clone(),
        config.contract.clone(),
        LocalSignerProvider::new(accounts.clone(), rpc.clone(), network.name.clone()),
        ZkSyncDeployer::new(rpc.clone(), accounts),
        RpcInspector::new(rpc),
        verifier,
    );

    let report = orchestrator.run(&mut std::io::stdout()).await?;
    tracing::info!(
        address = %report.deployment.contract_address,
        verification = ?report.verification,
        "Deployment complete"
    );

    Ok(())
}

async fn verify(cli: &Cli, address: Address) -> Result<()> {
    let config = DeployConfig::load(cli.config.as_deref())?;
    let network = config.network(cli.network.as_deref())?;
    let verifier = ZkSyncVerifier::for_network(&network, &config.compiler, &config.contract)?
        .with_context(|| format!("Verification is not enabled for network '{}'", network.name))?;

    tracing::info!(%address, network = %network.name, "Verifying contract...");

    let request = VerificationRequest::new(address, config.contract.fully_qualified());
    match VerificationOutcome::from_result(verifier.verify(&request).await) {
        VerificationOutcome::Success => {
            tracing::info!(%address, "Contract verified successfully");
        }
        VerificationOutcome::AlreadyVerified => {
            tracing::info!(%address, "Contract is already verified");
        }
        VerificationOutcome::Failed(detail) => {
            if let Some(url) = network.explorer_address_url(address) {
                tracing::info!("Verify manually on the explorer: {}#contract", url);
            }
            anyhow::bail!("Verification of {} failed: {}", address, detail);
        }
        VerificationOutcome::Skipped => {}
    }

    if let Some(url) = network.explorer_address_url(address) {
        tracing::info!("Explorer: {}", url);
    }
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    DeployConfig::default().save_to_file(path)?;
    tracing::info!("Next: compile the contract, set WALLET_PRIVATE_KEY and run `deploy-placeholder deploy`");
    Ok(())
}
