//! Source verification through the zkSync contract verification API.

use std::{fmt, future::Future, str::FromStr, time::Duration};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    artifact::{self, BuildInfo, ContractArtifact},
    config::{CompilerConfig, ContractConfig, Network},
    rpc,
};

/// Interval between verification status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum number of status polls before giving up.
const DEFAULT_MAX_POLLS: usize = 60;

/// Code format accepted by the verification API.
const CODE_FORMAT: &str = "solidity-standard-json-input";

/// What to verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub address: Address,
    /// Fully-qualified contract identifier (`path/To.sol:Name`).
    pub contract: String,
    /// ABI-encoded constructor arguments.
    pub constructor_arguments: Bytes,
    /// Creation payload, used to check the artifact matches what was deployed.
    pub bytecode: Bytes,
}

impl VerificationRequest {
    /// A request without constructor arguments or creation payload.
    pub fn new(address: Address, contract: impl Into<String>) -> Self {
        Self {
            address,
            contract: contract.into(),
            constructor_arguments: Bytes::new(),
            bytecode: Bytes::new(),
        }
    }
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Success,
    AlreadyVerified,
    Failed(String),
    /// Not attempted (local network).
    Skipped,
}

impl VerificationOutcome {
    /// Classify the result of [`VerificationService::verify`].
    ///
    /// An error mentioning "already verified" (any case) is a success-equivalent.
    pub fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(err) => {
                let detail = format!("{:#}", err);
                if detail.to_lowercase().contains("already verified") {
                    Self::AlreadyVerified
                } else {
                    Self::Failed(detail)
                }
            }
        }
    }
}

/// Registers contract sources with a block explorer.
pub trait VerificationService {
    fn verify(&self, request: &VerificationRequest) -> impl Future<Output = Result<()>> + Send;
}

impl<V: VerificationService + Sync> VerificationService for Option<V> {
    async fn verify(&self, request: &VerificationRequest) -> Result<()> {
        match self {
            Some(verifier) => verifier.verify(request).await,
            None => anyhow::bail!("Verification is not enabled for this network"),
        }
    }
}

/// Status of a submitted verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    Queued,
    InProgress,
    Successful,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    compilation_errors: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    contract_address: Address,
    source_code: &'a Value,
    code_format: &'static str,
    contract_name: &'a str,
    compiler_zksolc_version: &'a str,
    compiler_solc_version: &'a str,
    optimization_used: bool,
    constructor_arguments: &'a Bytes,
}

/// Why a status poll did not yield success.
///
/// `Pending` and `Request` are retried within the poll budget.
#[derive(Debug)]
enum PollError {
    Pending(VerificationStatus),
    Failed(String),
    Request(anyhow::Error),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(status) => write!(f, "Verification still {}", status),
            Self::Failed(reason) => write!(f, "Verification failed: {}", reason),
            Self::Request(err) => write!(f, "{:#}", err),
        }
    }
}

impl std::error::Error for PollError {}

/// Client for the zkSync contract verification API.
#[derive(Debug, Clone)]
pub struct ZkSyncVerifier {
    client: reqwest::Client,
    verify_url: String,
    compiler: CompilerConfig,
    contract: ContractConfig,
    poll_interval: Duration,
    max_polls: usize,
}

impl ZkSyncVerifier {
    pub fn new(
        verify_url: impl Into<String>,
        compiler: CompilerConfig,
        contract: ContractConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client()?,
            verify_url: verify_url.into().trim_end_matches('/').to_string(),
            compiler,
            contract,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// A verifier for `network`, or `None` when verification is disabled there.
    pub fn for_network(
        network: &Network,
        compiler: &CompilerConfig,
        contract: &ContractConfig,
    ) -> Result<Option<Self>> {
        network
            .config
            .verification_endpoint()
            .map(|url| Self::new(url, compiler.clone(), contract.clone()))
            .transpose()
    }

    /// Set the interval between status polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum number of status polls.
    pub fn max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = max_polls;
        self
    }

    fn check_payload(&self, bytecode: &Bytes) {
        if bytecode.is_empty() {
            return;
        }

        let hash = ContractArtifact::load(&self.contract.artifact_path())
            .and_then(|artifact| artifact.bytecode_hash());
        match hash {
            Ok(hash) if !artifact::embeds_bytecode_hash(bytecode, &hash) => {
                tracing::warn!(
                    contract = %self.contract.fully_qualified(),
                    "Creation payload does not reference the artifact bytecode; verification will likely fail"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Could not compare payload with artifact");
            }
        }
    }

    /// Submit the verification request, returning its id.
    async fn submit(&self, request: &VerificationRequest) -> Result<u64> {
        let build_info =
            BuildInfo::find_for_source(&self.contract.build_info_dir(), &self.contract.source)?;

        let body = SubmitBody {
            contract_address: request.address,
            source_code: &build_info.input,
            code_format: CODE_FORMAT,
            contract_name: &request.contract,
            compiler_zksolc_version: &self.compiler.zksolc_version,
            compiler_solc_version: &self.compiler.solc_version,
            optimization_used: self.compiler.optimizer_enabled,
            constructor_arguments: &request.constructor_arguments,
        };

        let response = self
            .client
            .post(&self.verify_url)
            .json(&body)
            .send()
            .await
            .context("Failed to send verification request")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read verification response")?;

        if !status.is_success() {
            anyhow::bail!("Verification request rejected ({}): {}", status, text.trim());
        }

        text.trim()
            .parse::<u64>()
            .with_context(|| format!("Unexpected verification response: {}", text.trim()))
    }

    async fn poll_status(&self, id: u64) -> Result<(), PollError> {
        let response: StatusResponse = self
            .client
            .get(format!("{}/{}", self.verify_url, id))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("Failed to query verification status")
            .map_err(PollError::Request)?
            .json()
            .await
            .context("Failed to parse verification status")
            .map_err(PollError::Request)?;

        let status = VerificationStatus::from_str(&response.status).map_err(|_| {
            PollError::Failed(format!("unknown status '{}'", response.status))
        })?;

        match status {
            VerificationStatus::Successful => Ok(()),
            VerificationStatus::Queued | VerificationStatus::InProgress => {
                Err(PollError::Pending(status))
            }
            VerificationStatus::Failed => {
                let mut reason = response.error.unwrap_or_else(|| "unknown error".to_string());
                if let Some(errors) = response.compilation_errors.filter(|e| !e.is_empty()) {
                    reason = format!("{} ({})", reason, errors.join("; "));
                }
                Err(PollError::Failed(reason))
            }
        }
    }
}

impl VerificationService for ZkSyncVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<()> {
        self.check_payload(&request.bytecode);

        let id = self.submit(request).await?;
        tracing::info!(id, address = %request.address, "Verification request submitted");

        let backoff = ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.max_polls);

        (|| self.poll_status(id))
            .retry(backoff)
            .when(|e| matches!(e, PollError::Pending(_) | PollError::Request(_)))
            .notify(|e, after| {
                tracing::debug!(id, status = %e, retry_in = ?after, "Waiting for verification");
            })
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADDRESS: Address = Address::repeat_byte(0x22);

    fn write_build_info(root: &Path) -> ContractConfig {
        let contract = ContractConfig {
            artifacts_dir: root.join("artifacts-zk"),
            ..Default::default()
        };
        let dir = contract.build_info_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("build.json"),
            serde_json::json!({
                "solcVersion": "0.8.24",
                "input": {
                    "language": "Solidity",
                    "sources": { contract.source.clone(): { "content": "contract PlaceholderContract {}" } }
                }
            })
            .to_string(),
        )
        .unwrap();
        contract
    }

    async fn verifier(server: &MockServer, contract: ContractConfig) -> ZkSyncVerifier {
        ZkSyncVerifier::new(
            format!("{}/contract_verification", server.uri()),
            CompilerConfig::default(),
            contract,
        )
        .unwrap()
        .poll_interval(Duration::from_millis(10))
        .max_polls(5)
    }

    fn request(contract: &ContractConfig) -> VerificationRequest {
        VerificationRequest::new(ADDRESS, contract.fully_qualified())
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(VerificationOutcome::from_result(Ok(())), VerificationOutcome::Success);
        assert_eq!(
            VerificationOutcome::from_result(Err(anyhow::anyhow!(
                "Verification request rejected (400 Bad Request): This contract is Already Verified"
            ))),
            VerificationOutcome::AlreadyVerified
        );
        assert_eq!(
            VerificationOutcome::from_result(Err(
                anyhow::anyhow!("ALREADY VERIFIED").context("Verification failed")
            )),
            VerificationOutcome::AlreadyVerified
        );
        assert_eq!(
            VerificationOutcome::from_result(Err(anyhow::anyhow!("bytecode mismatch"))),
            VerificationOutcome::Failed("bytecode mismatch".to_string())
        );
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            VerificationStatus::from_str("in_progress").unwrap(),
            VerificationStatus::InProgress
        );
        assert_eq!(VerificationStatus::Successful.to_string(), "successful");
        assert!(VerificationStatus::from_str("done").is_err());
    }

    #[tokio::test]
    async fn test_disabled_verifier_fails() {
        let verifier: Option<ZkSyncVerifier> = None;
        let err = verifier
            .verify(&VerificationRequest::new(ADDRESS, "a.sol:A"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not enabled"));
    }

    #[tokio::test]
    async fn test_verify_polls_until_successful() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = write_build_info(dir.path());
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contract_verification"))
            .and(body_partial_json(serde_json::json!({
                "contractAddress": ADDRESS,
                "codeFormat": "solidity-standard-json-input",
                "contractName": "contracts/PlaceholderContract.sol:PlaceholderContract",
                "compilerSolcVersion": "0.8.24",
                "optimizationUsed": true,
                "constructorArguments": "0x",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("42"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/42"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "queued" })),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "successful" })),
            )
            .mount(&server)
            .await;

        let verifier = verifier(&server, contract.clone()).await;
        verifier.verify(&request(&contract)).await.unwrap();
    }

    #[tokio::test]
    async fn test_already_verified_rejection() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = write_build_info(dir.path());
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contract_verification"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("This contract is already verified"),
            )
            .mount(&server)
            .await;

        let verifier = verifier(&server, contract.clone()).await;
        let outcome = VerificationOutcome::from_result(verifier.verify(&request(&contract)).await);
        assert_eq!(outcome, VerificationOutcome::AlreadyVerified);
    }

    #[tokio::test]
    async fn test_failed_status_carries_compilation_errors() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = write_build_info(dir.path());
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contract_verification"))
            .respond_with(ResponseTemplate::new(200).set_body_string("7"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "failed",
                "error": "Compilation error",
                "compilationErrors": ["ParserError: expected ';'"]
            })))
            .mount(&server)
            .await;

        let verifier = verifier(&server, contract.clone()).await;
        let err = verifier.verify(&request(&contract)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Verification failed: Compilation error (ParserError: expected ';')"
        );
    }

    #[tokio::test]
    async fn test_gives_up_while_pending() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = write_build_info(dir.path());
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contract_verification"))
            .respond_with(ResponseTemplate::new(200).set_body_string("9"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "in_progress" })),
            )
            .mount(&server)
            .await;

        let verifier = verifier(&server, contract.clone()).await;
        let err = verifier.verify(&request(&contract)).await.unwrap_err();
        assert_eq!(err.to_string(), "Verification still in_progress");
    }

    #[tokio::test]
    async fn test_missing_build_info_sends_nothing() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = ContractConfig {
            artifacts_dir: dir.path().join("artifacts-zk"),
            ..Default::default()
        };
        let server = MockServer::start().await;

        let verifier = verifier(&server, contract.clone()).await;
        assert!(verifier.verify(&request(&contract)).await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_status_error_is_retried() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = write_build_info(dir.path());
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contract_verification"))
            .respond_with(ResponseTemplate::new(200).set_body_string("5"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/5"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "successful" })),
            )
            .mount(&server)
            .await;

        let verifier = verifier(&server, contract.clone()).await;
        verifier.verify(&request(&contract)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_status_is_not_retried() {
        let dir = tempdir::TempDir::new("verify").unwrap();
        let contract = write_build_info(dir.path());
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/contract_verification"))
            .respond_with(ResponseTemplate::new(200).set_body_string("6"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contract_verification/6"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "done" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let verifier = verifier(&server, contract.clone()).await;
        let err = verifier.verify(&request(&contract)).await.unwrap_err();
        assert_eq!(err.to_string(), "Verification failed: unknown status 'done'");
    }
}
