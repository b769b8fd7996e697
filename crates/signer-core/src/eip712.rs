//! Domain-separated EIP-712 typed-data hashing, and a schema-driven view
//! over a typed-data document used by the rule engine's
//! `eip712.message.<field>` condition dispatch (spec §4.3, §4.4, §9).
//!
//! Hashing itself is delegated to `alloy-dyn-abi`'s `TypedData`, which
//! already implements runtime-schema-driven `hashStruct`/domain-separator
//! derivation per EIP-712 — hand-rolling that here would just reinvent it
//! less carefully.

use alloy_dyn_abi::TypedData;
use alloy_primitives::{B256, U256};
use serde_json::Value;

use crate::error::CoreError;

/// Parses and validates a typed-data JSON document, then returns its
/// `keccak256(0x1901 || domain_separator || hash_struct(...))` digest.
pub fn signing_hash(typed_data: &Value) -> Result<B256, CoreError> {
    validate(typed_data)?;
    let parsed: TypedData = serde_json::from_value(typed_data.clone())
        .map_err(|e| CoreError::MalformedTypedData(e.to_string()))?;
    parsed
        .eip712_signing_hash()
        .map_err(|e| CoreError::MalformedTypedData(e.to_string()))
}

/// `primary_type` must be non-empty and present in `types`; `EIP712Domain`
/// must be present in `types` (spec §3 invariant).
fn validate(typed_data: &Value) -> Result<(), CoreError> {
    let primary_type = typed_data
        .get("primaryType")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::MalformedTypedData("missing primaryType".into()))?;
    if primary_type.is_empty() {
        return Err(CoreError::MalformedTypedData("empty primaryType".into()));
    }
    let types = typed_data
        .get("types")
        .and_then(Value::as_object)
        .ok_or_else(|| CoreError::MalformedTypedData("missing types".into()))?;
    if !types.contains_key(primary_type) {
        return Err(CoreError::MalformedTypedData(format!(
            "primaryType {primary_type:?} not declared in types"
        )));
    }
    if !types.contains_key("EIP712Domain") {
        return Err(CoreError::MalformedTypedData(
            "EIP712Domain not declared in types".into(),
        ));
    }
    Ok(())
}

/// A typed-variant view over one resolved EIP-712 message field, per the
/// type families the rule engine understands (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Uint(U256),
    Bool(bool),
}

/// Resolves `eip712.domain.<name>` — these are always plain strings/ints
/// on the `domain` object, never schema-typed.
pub fn domain_field(typed_data: &Value, name: &str) -> Option<String> {
    let domain = typed_data.get("domain")?;
    match name {
        "chainId" => domain
            .get("chainId")
            .map(|v| v.as_u64().map(|n| n.to_string()).unwrap_or_else(|| v.to_string())),
        other => domain.get(other).and_then(Value::as_str).map(str::to_string),
    }
}

/// Resolves `eip712.message.<field>` by looking up `field`'s declared type
/// in `types[primaryType]`, then reading the matching value out of
/// `message` and coercing it into the corresponding [`FieldValue`] family.
pub fn message_field(typed_data: &Value, field: &str) -> Option<FieldValue> {
    let primary_type = typed_data.get("primaryType")?.as_str()?;
    let fields = typed_data.get("types")?.get(primary_type)?.as_array()?;
    let decl = fields
        .iter()
        .find(|f| f.get("name").and_then(Value::as_str) == Some(field))?;
    let ty = decl.get("type")?.as_str()?;
    let raw = typed_data.get("message")?.get(field)?;

    if ty.starts_with("uint") || ty.starts_with("int") {
        let as_str = match raw {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let parsed = if let Some(hex) = as_str.strip_prefix("0x").or(as_str.strip_prefix("0X")) {
            U256::from_str_radix(hex, 16).ok()?
        } else {
            U256::from_str_radix(&as_str, 10).ok()?
        };
        Some(FieldValue::Uint(parsed))
    } else if ty == "bool" {
        match raw {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::String(s) => s.parse::<bool>().ok().map(FieldValue::Bool),
            _ => None,
        }
    } else if ty == "address" || ty == "string" || ty.starts_with("bytes") {
        raw.as_str().map(|s| FieldValue::Str(s.to_string()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn permit_typed_data() -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"}
                ],
                "Permit": [
                    {"name": "owner", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ]
            },
            "primaryType": "Permit",
            "domain": {
                "name": "Permit",
                "version": "1",
                "chainId": 137,
                "verifyingContract": "0x1111111111111111111111111111111111111111"
            },
            "message": {
                "owner": "0x2222222222222222222222222222222222222222",
                "amount": "100"
            }
        })
    }

    #[test]
    fn signing_hash_is_32_bytes() {
        let hash = signing_hash(&permit_typed_data()).unwrap();
        assert_eq!(hash.0.len(), 32);
    }

    #[test]
    fn domain_name_resolves() {
        assert_eq!(
            domain_field(&permit_typed_data(), "name"),
            Some("Permit".to_string())
        );
    }

    #[test]
    fn domain_chain_id_resolves() {
        assert_eq!(
            domain_field(&permit_typed_data(), "chainId"),
            Some("137".to_string())
        );
    }

    #[test]
    fn message_uint_field_resolves() {
        assert_eq!(
            message_field(&permit_typed_data(), "amount"),
            Some(FieldValue::Uint(U256::from(100u64)))
        );
    }

    #[test]
    fn message_address_field_resolves_as_string() {
        assert_eq!(
            message_field(&permit_typed_data(), "owner"),
            Some(FieldValue::Str(
                "0x2222222222222222222222222222222222222222".to_string()
            ))
        );
    }

    #[test]
    fn rejects_missing_primary_type_declaration() {
        let mut td = permit_typed_data();
        td["primaryType"] = json!("Nonexistent");
        assert!(signing_hash(&td).is_err());
    }

    #[test]
    fn rejects_missing_domain_type() {
        let mut td = permit_typed_data();
        td["types"].as_object_mut().unwrap().remove("EIP712Domain");
        assert!(signing_hash(&td).is_err());
    }
}
