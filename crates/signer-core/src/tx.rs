//! Canonical cross-type transaction representation and normalization.
//!
//! A single struct carries the union of legacy/EIP-2930/EIP-1559 fields;
//! fields unused by a given `tx_type` are left at their zero value. Inputs
//! arrive over the wire with every numeric field as a decimal-or-hex
//! string (matching the upstream wire format) and are normalized here to
//! `0x`-prefixed lowercase hex before any hashing happens.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: String,
    #[serde(default)]
    pub storage_keys: Vec<String>,
}

/// Raw wire shape: every numeric field is a JSON string, decimal or
/// `0x`-prefixed hex. `chain_id` here is advisory only — the orchestrator
/// always overwrites it with the request's `chain_id` during normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(rename = "type", default)]
    pub tx_type: String,
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub gas: String,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub max_priority_fee_per_gas: String,
    #[serde(default)]
    pub max_fee_per_gas: String,
    #[serde(default, alias = "data")]
    pub input: String,
    #[serde(default)]
    pub access_list: Vec<AccessListItem>,
}

/// Canonical, normalized transaction. All numeric fields are already
/// parsed; `input`/`to`/`from` are lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx_type: u8,
    pub chain_id: u64,
    pub nonce: u64,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: U256,
    pub gas: u64,
    pub gas_price: u128,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub input: Bytes,
    pub access_list: alloy_eips::eip2930::AccessList,
}

fn parse_big(field: &str, s: &str) -> Result<U256, CoreError> {
    if s.is_empty() {
        return Ok(U256::ZERO);
    }
    let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let parsed = match stripped {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|_| CoreError::InvalidNumber {
        field: field.to_string(),
        value: s.to_string(),
    })
}

fn parse_u64(field: &str, s: &str) -> Result<u64, CoreError> {
    parse_big(field, s)?
        .try_into()
        .map_err(|_| CoreError::InvalidNumber {
            field: field.to_string(),
            value: s.to_string(),
        })
}

fn parse_u128(field: &str, s: &str) -> Result<u128, CoreError> {
    parse_big(field, s)?
        .try_into()
        .map_err(|_| CoreError::InvalidNumber {
            field: field.to_string(),
            value: s.to_string(),
        })
}

fn parse_address(field: &str, s: &str) -> Result<Option<Address>, CoreError> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<Address>()
        .map(Some)
        .map_err(|_| CoreError::InvalidNumber {
            field: field.to_string(),
            value: s.to_string(),
        })
}

fn parse_hex_bytes(s: &str) -> Bytes {
    if s.is_empty() {
        return Bytes::new();
    }
    let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    match hex::decode(stripped) {
        Ok(bytes) => Bytes::from(bytes),
        Err(_) => Bytes::new(),
    }
}

impl Transaction {
    /// Normalizes a raw wire transaction, overwriting `chain_id` with the
    /// request-level chain id per the orchestrator contract in §4.2/§4.8.
    pub fn normalize(raw: &RawTransaction, request_chain_id: u64) -> Result<Self, CoreError> {
        let tx_type: u8 = if raw.tx_type.is_empty() {
            0
        } else {
            parse_u64("type", &raw.tx_type)? as u8
        };
        if tx_type > 2 {
            return Err(CoreError::UnsupportedTxType(tx_type));
        }

        let access_list = alloy_eips::eip2930::AccessList(
            raw.access_list
                .iter()
                .map(|item| {
                    let address = item.address.parse::<Address>().map_err(|_| {
                        CoreError::MalformedTransaction(format!(
                            "invalid access list address: {}",
                            item.address
                        ))
                    })?;
                    let storage_keys = item
                        .storage_keys
                        .iter()
                        .map(|k| {
                            k.parse().map_err(|_| {
                                CoreError::MalformedTransaction(format!(
                                    "invalid storage key: {k}"
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>, CoreError>>()?;
                    Ok(alloy_eips::eip2930::AccessListItem {
                        address,
                        storage_keys,
                    })
                })
                .collect::<Result<Vec<_>, CoreError>>()?,
        );

        Ok(Transaction {
            tx_type,
            chain_id: request_chain_id,
            nonce: parse_u64("nonce", &raw.nonce)?,
            from: parse_address("from", &raw.from)?,
            to: parse_address("to", &raw.to)?,
            value: parse_big("value", &raw.value)?,
            gas: parse_u64("gas", &raw.gas)?,
            gas_price: parse_u128("gasPrice", &raw.gas_price)?,
            max_priority_fee_per_gas: parse_u128(
                "maxPriorityFeePerGas",
                &raw.max_priority_fee_per_gas,
            )?,
            max_fee_per_gas: parse_u128("maxFeePerGas", &raw.max_fee_per_gas)?,
            input: parse_hex_bytes(&raw.input),
            access_list,
        })
    }

    /// Lowercase hex `input`, used by the rule engine's `data`/`data_selector`
    /// fields.
    pub fn input_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.input))
    }

    /// First 10 characters of `input_hex` (`0x` + 4-byte selector), or the
    /// whole string if shorter.
    pub fn data_selector(&self) -> String {
        let full = self.input_hex();
        full.chars().take(10).collect()
    }
}
