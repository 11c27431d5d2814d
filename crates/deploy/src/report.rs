//! Console report blocks.

use std::io::Write;

use alloy_core::primitives::{Address, utils::format_ether};
use anyhow::Result;
use comfy_table::{Cell, Table, presets::ASCII_MARKDOWN};

use crate::{
    config::Network, deployer::DeploymentResult, inspect::ContractState,
    signer::DeploymentContext,
};

/// The command that verifies an already deployed contract.
pub fn manual_verify_command(network: &str, address: Address) -> String {
    format!("deploy-placeholder verify --network {} {}", network, address)
}

/// Print the read-back contract state.
pub fn write_contract_state(out: &mut impl Write, state: &ContractState) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "Contract Information:")?;
    writeln!(out, "- Placeholder Price: {} ETH", format_ether(state.placeholder_price))?;
    writeln!(out, "- Contract Owner: {}", state.owner)?;
    writeln!(out, "- Next Placeholder ID: {}", state.next_placeholder_id)?;
    writeln!(out, "- Contract Balance: {} ETH", format_ether(state.contract_balance))?;
    Ok(())
}

/// Print instructions for verifying `address` by hand.
pub fn write_manual_verification(
    out: &mut impl Write,
    network: &Network,
    address: Address,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "===== MANUAL VERIFICATION INSTRUCTIONS =====")?;
    writeln!(out, "Automatic verification of {} failed. To verify manually:", address)?;
    writeln!(out, "- Wait a few more minutes for the contract to be fully processed")?;
    // The verify command needs a verification endpoint.
    if network.config.verification_endpoint().is_some() {
        writeln!(out, "- Run the following command:")?;
        writeln!(out, "   {}", manual_verify_command(&network.name, address))?;
    }
    if let Some(url) = network.explorer_address_url(address) {
        writeln!(out, "- Or verify on the explorer:")?;
        writeln!(out, "   {}#contract", url)?;
    }
    writeln!(out, "=============================================")?;
    Ok(())
}

/// Print the deployment summary table.
pub fn write_summary(
    out: &mut impl Write,
    network: &Network,
    contract: &str,
    context: &DeploymentContext,
    deployment: &DeploymentResult,
) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN);
    table.set_header(["Field", "Value"]);

    let explorer = network
        .explorer_address_url(deployment.contract_address)
        .unwrap_or_else(|| "-".to_string());

    let rows = [
        ("Network", network.name.clone()),
        ("Contract", contract.to_string()),
        ("Address", deployment.contract_address.to_string()),
        ("Deployer", context.signer_address.to_string()),
        ("Transaction Hash", deployment.tx_hash.to_string()),
        ("Block Number", deployment.block_number.to_string()),
        ("Explorer", explorer),
    ];
    for (field, value) in rows {
        table.add_row([Cell::new(field), Cell::new(value)]);
    }

    writeln!(out)?;
    writeln!(out, "===== DEPLOYMENT SUMMARY =====")?;
    writeln!(out, "{}", table)?;
    Ok(())
}

/// Print how to interact with the deployed contract.
pub fn write_usage(
    out: &mut impl Write,
    network: &Network,
    context: &DeploymentContext,
    address: Address,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "===== USAGE INSTRUCTIONS =====")?;
    writeln!(out, "Contract Functions:")?;
    writeln!(out, "- buyPlaceholder(): Send 0.05 ETH to get a placeholder ID")?;
    writeln!(out, "- withdrawPlaceholder(id): Withdraw your ETH and burn the placeholder")?;
    writeln!(out, "- getPlaceholderDetails(id): View placeholder information")?;
    writeln!(out, "- getUserPlaceholders(address): View all user's placeholders")?;

    if let Some(url) = network.explorer_address_url(address) {
        writeln!(out)?;
        writeln!(out, "Explorer Links:")?;
        writeln!(out, "- Contract: {}", url)?;
        writeln!(out, "- Transactions: {}#transactions", url)?;
    }

    writeln!(out)?;
    writeln!(out, "Initial contract setup:")?;
    writeln!(out, "- Contract owner: {}", context.signer_address)?;
    writeln!(out, "- Placeholder price: 0.05 ETH")?;
    writeln!(out, "- ReentrancyGuard: Enabled")?;
    writeln!(out, "- Emergency withdraw: Available to owner")?;
    Ok(())
}
