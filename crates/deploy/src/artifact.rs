//! Compiler artifacts produced by zksolc, and zkSync bytecode hashing.

use std::path::Path;

use alloy_core::primitives::{B256, Bytes};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Version byte of the zkSync versioned bytecode hash.
const BYTECODE_HASH_VERSION: u8 = 1;

/// Size of a bytecode word in bytes.
const WORD_SIZE: usize = 32;

/// A compiled contract artifact (`artifacts-zk/<source>/<Name>.json`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Load an artifact from its JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no bytecode (is {} abstract?)",
                path.display(),
                artifact.contract_name
            );
        }

        Ok(artifact)
    }

    /// The zkSync versioned hash of this artifact's bytecode.
    pub fn bytecode_hash(&self) -> Result<B256> {
        bytecode_hash(&self.bytecode)
    }
}

/// Compute the zkSync versioned bytecode hash.
///
/// Layout: `[version, 0, word_count_hi, word_count_lo, sha256(bytecode)[4..32]]`.
/// The bytecode must consist of an odd number of 32-byte words, fewer than 2^16.
pub fn bytecode_hash(bytecode: &[u8]) -> Result<B256> {
    if bytecode.len() % WORD_SIZE != 0 {
        anyhow::bail!(
            "Bytecode length {} is not a multiple of {}",
            bytecode.len(),
            WORD_SIZE
        );
    }

    let words = bytecode.len() / WORD_SIZE;
    let words = u16::try_from(words)
        .with_context(|| format!("Bytecode is too long: {} words", words))?;
    if words % 2 == 0 {
        anyhow::bail!("Bytecode word count must be odd, got {}", words);
    }

    let digest = Sha256::digest(bytecode);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);
    hash[0] = BYTECODE_HASH_VERSION;
    hash[1] = 0;
    hash[2..4].copy_from_slice(&words.to_be_bytes());

    Ok(B256::from(hash))
}

/// Whether `payload` references the given bytecode hash.
pub fn embeds_bytecode_hash(payload: &[u8], hash: &B256) -> bool {
    payload
        .windows(hash.len())
        .any(|window| window == hash.as_slice())
}

/// Compiler input recorded in a build-info file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(default)]
    pub solc_version: Option<String>,
    /// The solc standard JSON input.
    pub input: Value,
}

impl BuildInfo {
    fn has_source(&self, source: &str) -> bool {
        self.input
            .get("sources")
            .and_then(|sources| sources.get(source))
            .is_some()
    }

    /// Find the build-info file in `dir` whose input compiled `source`.
    pub fn find_for_source(dir: &Path, source: &str) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read build-info directory {}", dir.display()))?;

        let mut paths = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<_>>();
        // Newest first.
        paths.sort_by_key(|path| {
            std::cmp::Reverse(
                std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok(),
            )
        });

        for path in paths {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable build-info");
                    continue;
                }
            };
            let Ok(build_info) = serde_json::from_str::<Self>(&content) else {
                tracing::debug!(path = %path.display(), "Skipping malformed build-info");
                continue;
            };
            if build_info.has_source(source) {
                tracing::debug!(path = %path.display(), source, "Found build-info");
                return Ok(build_info);
            }
        }

        anyhow::bail!(
            "No build-info in {} contains source {}",
            dir.display(),
            source
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytecode_hash_layout() {
        let bytecode = [0xabu8; 96];
        let hash = bytecode_hash(&bytecode).unwrap();
        let digest = Sha256::digest(bytecode);

        assert_eq!(&hash[..4], &[1, 0, 0, 3]);
        assert_eq!(&hash[4..], &digest[4..]);
    }

    #[test]
    fn test_bytecode_hash_rejects_partial_words() {
        let err = bytecode_hash(&[0u8; 33]).unwrap_err();
        assert!(err.to_string().contains("not a multiple of 32"));
    }

    #[test]
    fn test_bytecode_hash_rejects_even_word_count() {
        let err = bytecode_hash(&[0u8; 64]).unwrap_err();
        assert!(err.to_string().contains("must be odd"));
    }

    #[test]
    fn test_embeds_bytecode_hash() {
        let hash = bytecode_hash(&[7u8; 32]).unwrap();
        let mut payload = vec![0u8; 36];
        payload.extend_from_slice(hash.as_slice());
        payload.extend_from_slice(&[0u8; 64]);

        assert!(embeds_bytecode_hash(&payload, &hash));
        assert!(!embeds_bytecode_hash(&payload[..40], &hash));
        assert!(!embeds_bytecode_hash(&[], &hash));
    }

    #[test]
    fn test_load_artifact() {
        let dir = tempdir::TempDir::new("artifact").unwrap();
        let path = dir.path().join("PlaceholderContract.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "_format": "hh-zksolc-artifact-1",
                "contractName": "PlaceholderContract",
                "sourceName": "contracts/PlaceholderContract.sol",
                "abi": [],
                "bytecode": format!("0x{}", "00".repeat(32)),
                "deployedBytecode": "0x",
                "factoryDeps": {}
            })
            .to_string(),
        )
        .unwrap();

        let artifact = ContractArtifact::load(&path).unwrap();
        assert_eq!(artifact.contract_name, "PlaceholderContract");
        assert_eq!(artifact.bytecode.len(), 32);
        assert!(artifact.bytecode_hash().is_ok());
    }

    #[test]
    fn test_load_artifact_without_bytecode() {
        let dir = tempdir::TempDir::new("artifact").unwrap();
        let path = dir.path().join("Abstract.json");
        std::fs::write(
            &path,
            r#"{"contractName":"Abstract","sourceName":"contracts/Abstract.sol","bytecode":"0x"}"#,
        )
        .unwrap();

        let err = ContractArtifact::load(&path).unwrap_err();
        assert!(err.to_string().contains("has no bytecode"));
    }

    #[test]
    fn test_find_build_info_for_source() {
        let dir = tempdir::TempDir::new("build-info").unwrap();
        std::fs::write(
            dir.path().join("other.json"),
            r#"{"solcVersion":"0.8.24","input":{"sources":{"contracts/Other.sol":{}}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        std::fs::write(
            dir.path().join("placeholder.json"),
            r#"{"solcVersion":"0.8.24","input":{"language":"Solidity","sources":{"contracts/PlaceholderContract.sol":{"content":"// src"}}}}"#,
        )
        .unwrap();

        let info =
            BuildInfo::find_for_source(dir.path(), "contracts/PlaceholderContract.sol").unwrap();
        assert_eq!(info.solc_version.as_deref(), Some("0.8.24"));
        assert_eq!(info.input["language"], "Solidity");

        let err = BuildInfo::find_for_source(dir.path(), "contracts/Missing.sol").unwrap_err();
        assert!(err.to_string().contains("No build-info"));
    }
}
