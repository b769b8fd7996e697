//! A single predicate over a signing request: field selection, comparison
//! symbol, and (for `data_param`) a cached ABI fragment used to decode a
//! call argument. Compiled once at rule-set load time (spec §4.4).

use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::Function;
use alloy_primitives::U256;
use regex::Regex;
use serde::Deserialize;

use crate::eip712::{self, FieldValue};
use crate::tx::Transaction;

/// The field a condition inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    From,
    To,
    Value,
    DataSelector,
    Data,
    DataParam,
    Message,
    Eip712DomainName,
    Eip712DomainVersion,
    Eip712DomainChainId,
    Eip712DomainVerifyingContract,
    Eip712PrimaryType,
    Eip712Message(String),
}

impl Field {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "from" => Field::From,
            "to" => Field::To,
            "value" => Field::Value,
            "data_selector" => Field::DataSelector,
            "data" => Field::Data,
            "data_param" => Field::DataParam,
            "message" => Field::Message,
            "eip712.domain.name" => Field::Eip712DomainName,
            "eip712.domain.version" => Field::Eip712DomainVersion,
            "eip712.domain.chainId" => Field::Eip712DomainChainId,
            "eip712.domain.verifyingContract" => Field::Eip712DomainVerifyingContract,
            "eip712.primaryType" => Field::Eip712PrimaryType,
            other => other
                .strip_prefix("eip712.message.")
                .map(|f| Field::Eip712Message(f.to_string()))?,
        })
    }
}

/// The comparison operator a condition applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Eq,
    Gte,
    Lte,
    In,
    Contains,
    Regex,
}

impl Symbol {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "==" => Symbol::Eq,
            ">=" => Symbol::Gte,
            "<=" => Symbol::Lte,
            "in" => Symbol::In,
            "contains" => Symbol::Contains,
            "regex" => Symbol::Regex,
            _ => return None,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawCondition {
    pub field: String,
    pub symbol: String,
    pub value: String,
    #[serde(default)]
    pub abi: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
}

struct CompiledAbi {
    selector: [u8; 4],
    inputs: Vec<(String, alloy_dyn_abi::DynSolType)>,
}

pub struct Condition {
    field: Field,
    symbol: Symbol,
    /// Lowercased at load time, per spec §3.
    value: String,
    abi: Option<CompiledAbi>,
    param: Option<String>,
    regex: Option<Regex>,
}

fn parse_bigint(s: &str) -> Option<U256> {
    if s.is_empty() {
        return Some(U256::ZERO);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_str_radix(s, 10).ok()
    }
}

impl Condition {
    /// Compiles a raw JSON condition: lowercases `value`, and — if `abi` is
    /// present — parses the single-function fragment, computing its
    /// selector and input list. A malformed ABI fragment is logged and
    /// leaves the condition with no selector; it always evaluates `false`
    /// thereafter rather than failing rule-set load (spec §4.4).
    pub fn compile(raw: RawCondition) -> Self {
        let field = Field::parse(&raw.field).unwrap_or(Field::Data);
        let symbol = Symbol::parse(&raw.symbol).unwrap_or(Symbol::Eq);
        let value = raw.value.to_lowercase();
        let regex = if symbol == Symbol::Regex {
            Regex::new(&value).ok()
        } else {
            None
        };
        let abi = raw.abi.as_deref().and_then(|sig| match Function::parse(sig) {
            Ok(func) => {
                let inputs = func
                    .inputs
                    .iter()
                    .filter_map(|p| p.resolve().ok().map(|ty| (p.name.clone(), ty)))
                    .collect();
                Some(CompiledAbi {
                    selector: func.selector(),
                    inputs,
                })
            }
            Err(e) => {
                tracing::warn!(abi = sig, error = %e, "malformed abi fragment on rule condition");
                None
            }
        });
        Condition {
            field,
            symbol,
            value,
            abi,
            param: raw.param,
            regex,
        }
    }

    fn eval_str(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        match self.symbol {
            Symbol::Eq => candidate == self.value,
            Symbol::Contains => candidate.contains(&self.value),
            Symbol::In => self.value.split(',').any(|v| v.trim() == candidate),
            Symbol::Regex => self
                .regex
                .as_ref()
                .map(|r| r.is_match(&candidate))
                .unwrap_or(false),
            Symbol::Gte | Symbol::Lte => {
                tracing::warn!(
                    symbol = ?self.symbol,
                    candidate,
                    "gte/lte applied to a string-typed field, evaluating false"
                );
                false
            }
        }
    }

    fn eval_bigint(&self, candidate: U256) -> bool {
        let Some(reference) = parse_bigint(&self.value) else {
            return false;
        };
        match self.symbol {
            Symbol::Eq => candidate == reference,
            Symbol::Gte => candidate >= reference,
            Symbol::Lte => candidate <= reference,
            Symbol::In => self
                .value
                .split(',')
                .any(|v| parse_bigint(v.trim()) == Some(candidate)),
            Symbol::Contains | Symbol::Regex => false,
        }
    }

    fn eval_bool(&self, candidate: bool) -> bool {
        match self.symbol {
            Symbol::Eq => candidate.to_string() == self.value,
            _ => false,
        }
    }

    /// Evaluates against a normalized transaction.
    pub fn is_match_tx(&self, tx: &Transaction) -> bool {
        match &self.field {
            Field::From => tx
                .from
                .map(|a| self.eval_str(&a.to_string()))
                .unwrap_or(false),
            Field::To => tx.to.map(|a| self.eval_str(&a.to_string())).unwrap_or(false),
            Field::Value => self.eval_bigint(tx.value),
            Field::DataSelector => {
                let sel = tx.data_selector();
                if sel.len() < 10 {
                    false
                } else {
                    self.eval_str(&sel)
                }
            }
            Field::Data => self.eval_str(&tx.input_hex()),
            Field::DataParam => self.is_match_data_param(tx),
            _ => false,
        }
    }

    /// §4.4 "Data-parameter matching": selector check, decode, locate
    /// argument by name, apply the symbol to its value.
    fn is_match_data_param(&self, tx: &Transaction) -> bool {
        let Some(abi) = &self.abi else {
            return false;
        };
        let Some(param_name) = &self.param else {
            return false;
        };
        let input_hex = tx.input_hex();
        if input_hex.len() < 10 {
            return false;
        }
        let selector_hex = &input_hex[2..10];
        let Ok(selector_bytes) = hex::decode(selector_hex) else {
            return false;
        };
        if selector_bytes != abi.selector {
            return false;
        }
        let Some((_, ty)) = abi.inputs.iter().find(|(name, _)| name == param_name) else {
            return false;
        };
        let calldata = &tx.input[4.min(tx.input.len())..];
        let types: Vec<alloy_dyn_abi::DynSolType> = abi.inputs.iter().map(|(_, t)| t.clone()).collect();
        let Ok(decoded) = alloy_dyn_abi::DynSolType::Tuple(types.clone()).abi_decode_sequence(calldata) else {
            return false;
        };
        let DynSolValue::Tuple(values) = decoded else {
            return false;
        };
        let Some(idx) = abi.inputs.iter().position(|(name, _)| name == param_name) else {
            return false;
        };
        let Some(value) = values.get(idx) else {
            return false;
        };
        match (ty, value) {
            (alloy_dyn_abi::DynSolType::Uint(_, _), DynSolValue::Uint(u, _)) => self.eval_bigint(*u),
            (_, DynSolValue::Address(a)) => self.eval_str(&a.to_string()),
            (_, DynSolValue::String(s)) => self.eval_str(s),
            (_, DynSolValue::Bytes(b)) => self.eval_str(&format!("0x{}", hex::encode(b))),
            _ => {
                tracing::warn!(param = %param_name, "unsupported data_param argument type, evaluating false");
                false
            }
        }
    }

    /// Evaluates against a personal-sign message (already lowercased at
    /// extraction time by the caller is not assumed; lowercasing happens
    /// in `eval_str`).
    pub fn is_match_message(&self, message: &str) -> bool {
        match self.field {
            Field::Message => self.eval_str(message),
            _ => false,
        }
    }

    /// Evaluates against an EIP-712 typed-data document.
    pub fn is_match_eip712(&self, typed_data: &serde_json::Value) -> bool {
        match &self.field {
            Field::Eip712DomainName => eip712::domain_field(typed_data, "name")
                .map(|v| self.eval_str(&v))
                .unwrap_or(false),
            Field::Eip712DomainVersion => eip712::domain_field(typed_data, "version")
                .map(|v| self.eval_str(&v))
                .unwrap_or(false),
            Field::Eip712DomainChainId => eip712::domain_field(typed_data, "chainId")
                .map(|v| self.eval_bigint(parse_bigint(&v).unwrap_or(U256::ZERO)))
                .unwrap_or(false),
            Field::Eip712DomainVerifyingContract => {
                eip712::domain_field(typed_data, "verifyingContract")
                    .map(|v| self.eval_str(&v))
                    .unwrap_or(false)
            }
            Field::Eip712PrimaryType => typed_data
                .get("primaryType")
                .and_then(|v| v.as_str())
                .map(|v| self.eval_str(v))
                .unwrap_or(false),
            Field::Eip712Message(name) => match eip712::message_field(typed_data, name) {
                Some(FieldValue::Str(s)) => self.eval_str(&s),
                Some(FieldValue::Uint(u)) => self.eval_bigint(u),
                Some(FieldValue::Bool(b)) => self.eval_bool(b),
                None => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::RawTransaction;
    use serde_json::json;

    fn tx_with_value(value: &str) -> Transaction {
        let raw = RawTransaction {
            tx_type: "0".into(),
            chain_id: "1".into(),
            nonce: "0".into(),
            from: "".into(),
            to: "0x1111111111111111111111111111111111111111".into(),
            value: value.into(),
            gas: "21000".into(),
            gas_price: "0".into(),
            max_priority_fee_per_gas: "".into(),
            max_fee_per_gas: "".into(),
            input: "0x".into(),
            access_list: vec![],
        };
        Transaction::normalize(&raw, 1).unwrap()
    }

    fn cond(field: &str, symbol: &str, value: &str) -> Condition {
        Condition::compile(RawCondition {
            field: field.into(),
            symbol: symbol.into(),
            value: value.into(),
            abi: None,
            param: None,
        })
    }

    #[test]
    fn value_gte_matches_hex_and_decimal_identically() {
        let c = cond("value", ">=", "2000000000000000000");
        assert!(!c.is_match_tx(&tx_with_value("1000000000000000000")));
        assert!(c.is_match_tx(&tx_with_value("0x1bc16d674ec80000")));
    }

    #[test]
    fn to_equality_is_case_insensitive() {
        let c = cond("to", "==", "0x1111111111111111111111111111111111111111");
        assert!(c.is_match_tx(&tx_with_value("0")));
    }

    #[test]
    fn data_selector_rejects_short_input() {
        let c = cond("data_selector", "==", "0xa9059cbb");
        assert!(!c.is_match_tx(&tx_with_value("0")));
    }

    #[test]
    fn message_contains_matches() {
        let c = cond("message", "contains", "hello");
        assert!(c.is_match_message("say hello there"));
        assert!(!c.is_match_message("goodbye"));
    }

    #[test]
    fn eip712_domain_name_and_chain_id_match() {
        let td = json!({
            "types": {"EIP712Domain": [], "Permit": []},
            "primaryType": "Permit",
            "domain": {"name": "Permit", "chainId": 137},
            "message": {}
        });
        let name_cond = cond("eip712.domain.name", "==", "permit");
        let chain_cond = cond("eip712.domain.chainId", "==", "137");
        assert!(name_cond.is_match_eip712(&td));
        assert!(chain_cond.is_match_eip712(&td));
    }

    #[test]
    fn gte_on_string_field_never_matches() {
        let c = cond("to", ">=", "0x0000000000000000000000000000000000000000");
        assert!(!c.is_match_tx(&tx_with_value("0")));
    }

    #[test]
    fn in_symbol_matches_membership() {
        let c = cond("to", "in", "0x1111111111111111111111111111111111111111,0x2222222222222222222222222222222222222222");
        assert!(c.is_match_tx(&tx_with_value("0")));
    }
}
