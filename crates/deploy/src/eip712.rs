//! zkSync EIP-712 (type `0x71`) transactions.
//!
//! Contract creation on zkSync goes through the `ContractDeployer` system
//! contract, with the contract bytecode shipped as a factory dependency. Only
//! EIP-712 transactions can carry factory dependencies.

use std::borrow::Cow;

use alloy_core::{
    primitives::{Address, B256, Bytes, Signature, U256},
    rlp::{Encodable, Header},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};
use anyhow::Result;

use crate::artifact::bytecode_hash;

/// EIP-2718 type byte of zkSync EIP-712 transactions.
pub const EIP712_TX_TYPE: u8 = 0x71;

/// Default gas limit per pubdata byte when the fee estimate does not provide one.
pub const DEFAULT_GAS_PER_PUBDATA: u64 = 50_000;

sol! {
    /// The EIP-712 struct signed by zkSync accounts.
    struct Transaction {
        uint256 txType;
        uint256 from;
        uint256 to;
        uint256 gasLimit;
        uint256 gasPerPubdataByteLimit;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        uint256 paymaster;
        uint256 nonce;
        uint256 value;
        bytes data;
        bytes32[] factoryDeps;
        bytes paymasterInput;
    }
}

/// An unsigned zkSync EIP-712 transaction without paymaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub from: Address,
    pub to: Address,
    pub gas_limit: U256,
    pub gas_per_pubdata: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub value: U256,
    pub data: Bytes,
    /// Raw bytecodes published with the transaction.
    pub factory_deps: Vec<Bytes>,
}

fn address_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

impl Eip712Transaction {
    /// The `zkSync` / `2` signing domain for `chain_id`.
    pub fn domain(chain_id: u64) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed("zkSync")),
            Some(Cow::Borrowed("2")),
            Some(U256::from(chain_id)),
            None,
            None,
        )
    }

    /// The digest the sender signs.
    pub fn signing_hash(&self) -> Result<B256> {
        let factory_deps = self
            .factory_deps
            .iter()
            .map(|dep| bytecode_hash(dep))
            .collect::<Result<Vec<_>>>()?;

        let typed = Transaction {
            txType: U256::from(EIP712_TX_TYPE),
            from: address_word(self.from),
            to: address_word(self.to),
            gasLimit: self.gas_limit,
            gasPerPubdataByteLimit: self.gas_per_pubdata,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymaster: U256::ZERO,
            nonce: U256::from(self.nonce),
            value: self.value,
            data: self.data.clone(),
            factoryDeps: factory_deps,
            paymasterInput: Bytes::new(),
        };

        Ok(typed.eip712_signing_hash(&Self::domain(self.chain_id)))
    }

    /// Encode the signed transaction for `eth_sendRawTransaction`.
    pub fn encode_signed(&self, signature: &Signature) -> Bytes {
        let mut payload = Vec::new();
        self.nonce.encode(&mut payload);
        self.max_priority_fee_per_gas.encode(&mut payload);
        self.max_fee_per_gas.encode(&mut payload);
        self.gas_limit.encode(&mut payload);
        self.to.encode(&mut payload);
        self.value.encode(&mut payload);
        self.data.encode(&mut payload);
        u8::from(signature.v()).encode(&mut payload);
        signature.r().encode(&mut payload);
        signature.s().encode(&mut payload);
        self.chain_id.encode(&mut payload);
        self.from.encode(&mut payload);
        self.gas_per_pubdata.encode(&mut payload);
        self.factory_deps.encode(&mut payload);
        Bytes::copy_from_slice(&signature.as_bytes()).encode(&mut payload);
        // Empty paymaster params.
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(&mut payload);

        let mut out = vec![EIP712_TX_TYPE];
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&payload);

        out.into()
    }
}
