//! JSON-RPC client for the target zkSync network.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between polling attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Create an HTTP client configured for JSON-RPC and explorer API requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Fee estimate returned by `zks_estimateFee`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fee {
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    #[serde(default)]
    pub gas_per_pubdata_limit: Option<U256>,
}

/// The subset of a transaction receipt used by the deployer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    /// A missing status field is treated as success (pre-Byzantium style nodes).
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status != U64::ZERO)
    }
}

/// JSON-RPC client bound to a single endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_client()?,
            url: url.into(),
        })
    }

    /// Make a JSON-RPC call and deserialize the result.
    ///
    /// # Returns
    /// The deserialized result, or an error if the request failed or returned an error response.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        let result: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = result.get("error") {
            anyhow::bail!(
                "RPC error: {}",
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown")
            );
        }

        let result_value = result
            .get("result")
            .context("No result in response")?
            .clone();

        serde_json::from_value(result_value)
            .with_context(|| format!("Failed to deserialize {} result", method))
    }

    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let chain_id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(chain_id.to())
    }

    pub async fn balance(&self, address: Address) -> Result<U256, anyhow::Error> {
        self.call(
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    pub async fn pending_nonce(&self, address: Address) -> Result<u64, anyhow::Error> {
        let nonce: U64 = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        Ok(nonce.to())
    }

    /// Execute a read-only call against the latest block.
    pub async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, anyhow::Error> {
        self.call(
            "eth_call",
            vec![
                serde_json::json!({ "to": to, "data": data }),
                serde_json::json!("latest"),
            ],
        )
        .await
    }

    pub async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, anyhow::Error> {
        self.call("eth_sendRawTransaction", vec![serde_json::json!(raw)])
            .await
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, anyhow::Error> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    /// Estimate fees for a zkSync call request (`zks_estimateFee`).
    pub async fn estimate_fee(&self, request: Value) -> Result<Fee, anyhow::Error> {
        self.call("zks_estimateFee", vec![request]).await
    }
}

/// Poll until `check_fn` succeeds, returning its value.
///
/// Errors from `check_fn` are logged at trace level and retried until `timeout` elapses.
pub async fn wait_until<T, F, Fut>(
    name: &str,
    timeout: Duration,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = tokio::time::Instant::now();

    loop {
        match check_fn().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::trace!(error = %e, waiting_for = %name, "Check failed, retrying...");
            }
        }

        if start.elapsed() > timeout {
            anyhow::bail!("Timeout waiting for {}", name);
        }

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{address, b256};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_rpc(rpc_method: &str, response: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_chain_id_decodes_hex() {
        let server = mock_rpc(
            "eth_chainId",
            serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": "0x148" }),
        )
        .await;

        let rpc = RpcClient::new(server.uri()).unwrap();
        assert_eq!(rpc.chain_id().await.unwrap(), 328);
    }

    #[tokio::test]
    async fn test_rpc_error_message_is_surfaced() {
        let server = mock_rpc(
            "eth_getBalance",
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "header not found" }
            }),
        )
        .await;

        let rpc = RpcClient::new(server.uri()).unwrap();
        let err = rpc.balance(Address::ZERO).await.unwrap_err();
        assert_eq!(err.to_string(), "RPC error: header not found");
    }

    #[tokio::test]
    async fn test_missing_receipt_is_none() {
        let server = mock_rpc(
            "eth_getTransactionReceipt",
            serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": null }),
        )
        .await;

        let rpc = RpcClient::new(server.uri()).unwrap();
        assert!(rpc.transaction_receipt(B256::ZERO).await.unwrap().is_none());
    }

    #[test]
    fn test_receipt_deserialization() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x64",
            "contractAddress": "0x2222222222222222222222222222222222222222",
            "status": "0x1",
            "logs": []
        }))
        .unwrap();

        assert_eq!(
            receipt.transaction_hash,
            b256!("1111111111111111111111111111111111111111111111111111111111111111")
        );
        assert_eq!(receipt.block_number, Some(U64::from(100)));
        assert_eq!(
            receipt.contract_address,
            Some(address!("2222222222222222222222222222222222222222"))
        );
        assert!(receipt.succeeded());
    }

    #[test]
    fn test_reverted_receipt() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "status": "0x0"
        }))
        .unwrap();
        assert!(!receipt.succeeded());
    }

    #[test]
    fn test_fee_deserialization() {
        let fee: Fee = serde_json::from_value(serde_json::json!({
            "gas_limit": "0x1e8480",
            "max_fee_per_gas": "0x17d7840",
            "max_priority_fee_per_gas": "0x0",
            "gas_per_pubdata_limit": "0xc350"
        }))
        .unwrap();

        assert_eq!(fee.gas_limit, U256::from(2_000_000u64));
        assert_eq!(fee.gas_per_pubdata_limit, Some(U256::from(50_000u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_times_out() {
        let err = wait_until("never", Duration::from_secs(5), || async {
            Err::<(), _>(anyhow::anyhow!("not yet"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Timeout waiting for never");
    }
}
