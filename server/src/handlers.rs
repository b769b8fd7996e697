//! The five HTTP endpoints and the shared request-orchestrator skeleton
//! they all follow (spec §4.8, §6.1).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use signer_core::tx::{RawTransaction, Transaction};
use signer_core::{eip712, hashing, signature};

use crate::error::SignerError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_root))
        .route("/ping", get(get_ping))
        .route("/v1/sign/transaction", post(post_sign_transaction))
        .route("/v1/sign/eip712", post(post_sign_eip712))
        .route("/v1/sign/message", post(post_sign_message))
        .route("/v1/address", post(post_address))
}

async fn get_root() -> &'static str {
    "evm-signer is running"
}

#[derive(Serialize)]
struct PingResponse {
    code: u32,
    msg: &'static str,
    data: &'static str,
}

async fn get_ping() -> Json<PingResponse> {
    Json(PingResponse {
        code: 0,
        msg: "success",
        data: "pong",
    })
}

/// Outer envelope every signing endpoint shares: `{"data": "<json string>"}`.
#[derive(Deserialize)]
struct Envelope {
    data: String,
}

fn check_ip(state: &AppState, addr: &SocketAddr) -> Result<(), SignerError> {
    let guard = state.lock().expect("state mutex poisoned");
    let ip = addr.ip().to_string();
    if guard.allow_list.iter().any(|allowed| allowed == &ip) {
        Ok(())
    } else {
        Err(SignerError::IllegalAccess(format!("ip: [ {ip} ] illegal")))
    }
}

#[derive(Deserialize)]
struct MsgInfo {
    chain_id: i64,
    account: String,
    transaction: String,
}

#[derive(Serialize)]
struct SignTransactionResponse {
    code: u32,
    msg: &'static str,
    data: SignTransactionData,
}

#[derive(Serialize)]
struct SignTransactionData {
    signature: String,
    tx: Value,
    tx_hex: String,
}

#[axum::debug_handler]
#[tracing::instrument(skip_all)]
async fn post_sign_transaction(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<SignTransactionResponse>, SignerError> {
    check_ip(&state, &addr)?;

    let msg: MsgInfo = serde_json::from_str(&envelope.data)
        .map_err(|e| SignerError::ParamError(format!("malformed MsgInfo: {e}")))?;
    if msg.account.is_empty() || msg.chain_id <= 0 || msg.transaction.is_empty() {
        return Err(SignerError::InvalidFormData(
            "account, chain_id and transaction are required".into(),
        ));
    }
    let chain_id = msg.chain_id as u64;

    let address: alloy_primitives::Address = msg
        .account
        .parse()
        .map_err(|_| SignerError::InvalidFormData(format!("invalid account address {}", msg.account)))?;

    let raw_tx: RawTransaction = serde_json::from_str(&msg.transaction)
        .map_err(|e| SignerError::ParamError(format!("malformed transaction: {e}")))?;
    let tx = Transaction::normalize(&raw_tx, chain_id)?;

    {
        let guard = state.lock().expect("state mutex poisoned");
        if !guard.chains.values().any(|c| c.chain_id == chain_id) {
            return Err(SignerError::ChainError(format!("unknown chain_id {chain_id}")));
        }
        if guard.accounts.by_address(&address).is_none() {
            return Err(SignerError::InvalidFormData(format!(
                "unknown account {}",
                msg.account
            )));
        }
        if guard.rules.matched_for_transaction(chain_id, &tx).is_none() {
            return Err(SignerError::InvalidFormData(format!(
                "match rule via sign transaction was mismatched via [ {chain_id} ] chainId"
            )));
        }
    }

    let hash = hashing::transaction_signing_hash(&tx)?;
    let sig = sign_hash_for_account(&state, &address, hash).await?;
    let rsv = signature::to_rsv_bytes(sig, false);
    let tx_bytes = hashing::encode_signed_transaction(&tx, sig)?;
    let tx_json = hashing::signed_transaction_json(&tx, sig, &tx_bytes);

    Ok(Json(SignTransactionResponse {
        code: 0,
        msg: "success",
        data: SignTransactionData {
            signature: format!("0x{}", hex::encode(rsv)),
            tx: tx_json,
            tx_hex: format!("0x{}", hex::encode(tx_bytes)),
        },
    }))
}

#[derive(Deserialize)]
struct Sign712MsgInfo {
    chain_id: i64,
    account: String,
    #[serde(rename = "Data")]
    data: String,
}

#[derive(Serialize)]
struct SignResponse {
    code: u32,
    msg: &'static str,
    data: SignatureData,
}

#[derive(Serialize)]
struct SignatureData {
    signature: String,
}

#[axum::debug_handler]
#[tracing::instrument(skip_all)]
async fn post_sign_eip712(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<SignResponse>, SignerError> {
    check_ip(&state, &addr)?;

    let msg: Sign712MsgInfo = serde_json::from_str(&envelope.data)
        .map_err(|e| SignerError::ParamError(format!("malformed Sign712MsgInfo: {e}")))?;
    if msg.account.is_empty() || msg.chain_id <= 0 || msg.data.is_empty() {
        return Err(SignerError::InvalidFormData(
            "account, chain_id and Data are required".into(),
        ));
    }
    let chain_id = msg.chain_id as u64;
    let address: alloy_primitives::Address = msg
        .account
        .parse()
        .map_err(|_| SignerError::InvalidFormData(format!("invalid account address {}", msg.account)))?;

    let typed_data: Value = serde_json::from_str(&msg.data)
        .map_err(|e| SignerError::ParamError(format!("malformed typed data: {e}")))?;
    let _primary_type = typed_data
        .get("primaryType")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SignerError::InvalidFormData("typed data missing primaryType".into()))?;
    if typed_data.get("types").and_then(Value::as_object).is_none() {
        return Err(SignerError::InvalidFormData("typed data missing types".into()));
    }

    {
        let guard = state.lock().expect("state mutex poisoned");
        if !guard.chains.values().any(|c| c.chain_id == chain_id) {
            return Err(SignerError::ChainError(format!("unknown chain_id {chain_id}")));
        }
        if guard.accounts.by_address(&address).is_none() {
            return Err(SignerError::InvalidFormData(format!(
                "unknown account {}",
                msg.account
            )));
        }
        if guard.rules.matched_for_eip712(chain_id, &typed_data).is_none() {
            return Err(SignerError::InvalidFormData(format!(
                "match rule via sign eip712 was mismatched via [ {chain_id} ] chainId"
            )));
        }
    }

    let hash = eip712::signing_hash(&typed_data)?;
    let sig = sign_hash_for_account(&state, &address, hash).await?;
    let rsv = signature::to_rsv_bytes(sig, true);

    Ok(Json(SignResponse {
        code: 0,
        msg: "success",
        data: SignatureData {
            signature: format!("0x{}", hex::encode(rsv)),
        },
    }))
}

#[derive(Deserialize)]
struct SignatureMsgInfo {
    chain_id: i64,
    account: String,
    message: String,
}

#[derive(Serialize)]
struct HexDataResponse {
    code: u32,
    msg: &'static str,
    data: String,
}

#[axum::debug_handler]
#[tracing::instrument(skip_all)]
async fn post_sign_message(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<HexDataResponse>, SignerError> {
    check_ip(&state, &addr)?;

    // Newlines inside `message` are pre-escaped so a literal line break in
    // the outer payload doesn't break the inner JSON parse (spec §6.1).
    let escaped = envelope.data.replace('\n', "\\n");
    let msg: SignatureMsgInfo = serde_json::from_str(&escaped)
        .map_err(|e| SignerError::ParamError(format!("malformed SignatureMsgInfo: {e}")))?;
    if msg.account.is_empty() || msg.chain_id <= 0 || msg.message.is_empty() {
        return Err(SignerError::InvalidFormData(
            "account, chain_id and message are required".into(),
        ));
    }
    let chain_id = msg.chain_id as u64;
    let address: alloy_primitives::Address = msg
        .account
        .parse()
        .map_err(|_| SignerError::InvalidFormData(format!("invalid account address {}", msg.account)))?;

    {
        let guard = state.lock().expect("state mutex poisoned");
        if !guard.chains.values().any(|c| c.chain_id == chain_id) {
            return Err(SignerError::ChainError(format!("unknown chain_id {chain_id}")));
        }
        if guard.accounts.by_address(&address).is_none() {
            return Err(SignerError::InvalidFormData(format!(
                "unknown account {}",
                msg.account
            )));
        }
        if guard.rules.matched_for_message(chain_id, &msg.message).is_none() {
            return Err(SignerError::InvalidFormData(format!(
                "match rule via sign message was mismatched via [ {chain_id} ] chainId, [ {} ] message",
                msg.message
            )));
        }
    }

    let hash = hashing::personal_sign_hash(msg.message.as_bytes());
    let sig = sign_hash_for_account(&state, &address, hash).await?;
    let rsv = signature::to_rsv_bytes(sig, true);

    Ok(Json(HexDataResponse {
        code: 0,
        msg: "success",
        data: format!("0x{}", hex::encode(rsv)),
    }))
}

#[derive(Deserialize)]
struct AddressMsgInfo {
    chain_id: i64,
    index: i64,
}

#[axum::debug_handler]
#[tracing::instrument(skip_all)]
async fn post_address(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(envelope): Json<Envelope>,
) -> Result<Json<HexDataResponse>, SignerError> {
    check_ip(&state, &addr)?;

    let msg: AddressMsgInfo = serde_json::from_str(&envelope.data)
        .map_err(|e| SignerError::ParamError(format!("malformed AddressMsgInfo: {e}")))?;
    if msg.chain_id <= 0 || msg.index < 0 {
        return Err(SignerError::InvalidFormData(
            "chain_id and index must be non-negative".into(),
        ));
    }

    let guard = state.lock().expect("state mutex poisoned");
    let chain_id = msg.chain_id as u64;
    if !guard.chains.values().any(|c| c.chain_id == chain_id) {
        return Err(SignerError::ChainError(format!("unknown chain_id {chain_id}")));
    }
    let account = guard
        .accounts
        .by_index(msg.index)
        .ok_or_else(|| SignerError::InvalidFormData(format!("unknown index {}", msg.index)))?;

    Ok(Json(HexDataResponse {
        code: 0,
        msg: "success",
        data: account.address.to_string(),
    }))
}

/// Dispatches signing to the account's software key or the shared HSM
/// gateway; HSM accounts carry only a key id, requiring the gateway to be
/// set before signing (spec §4.8 step 8).
async fn sign_hash_for_account(
    state: &AppState,
    address: &alloy_primitives::Address,
    hash: alloy_primitives::B256,
) -> Result<alloy_primitives::Signature, SignerError> {
    use signer_core::account::KeySource;

    enum Plan {
        Software(Box<alloy_signer_local::PrivateKeySigner>),
        Hsm(u64),
    }

    let plan = {
        let guard = state.lock().expect("state mutex poisoned");
        let account = guard
            .accounts
            .by_address(address)
            .ok_or_else(|| SignerError::InvalidFormData(format!("unknown account {address}")))?;
        match &account.key {
            KeySource::Software(signer) => Plan::Software(Box::new(signer.clone())),
            KeySource::Hsm { key_id } => Plan::Hsm(*key_id),
        }
    };

    match plan {
        Plan::Software(signer) => signature::sign_with_software_key(&signer, hash)
            .await
            .map_err(SignerError::from),
        Plan::Hsm(key_id) => {
            let guard = state.lock().expect("state mutex poisoned");
            let gateway = guard
                .hsm_gateway
                .as_ref()
                .ok_or_else(|| SignerError::SignError("no hsm gateway configured".into()))?;
            gateway
                .sign_hash(key_id, hash)
                .map_err(|e| SignerError::SignError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use alloy_signer_local::PrivateKeySigner;
    use signer_core::account::{Account, AccountTable};
    use signer_core::rules::Rules;

    use super::*;
    use crate::config::ChainConfig;
    use crate::state::AppStateInner;

    const TEST_KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567cdef";
    const LOCAL_IP: &str = "127.0.0.1";

    fn test_signer() -> PrivateKeySigner {
        TEST_KEY.parse().unwrap()
    }

    fn test_state(rule_json: &str, allow_list: Vec<&str>) -> AppState {
        let signer = test_signer();
        let account = Account::software(0, signer);
        let accounts = AccountTable::build(vec![account]).unwrap();
        let rules = Rules::load(rule_json).unwrap();
        let mut chains = HashMap::new();
        chains.insert(
            "ethereum".to_string(),
            ChainConfig {
                chain_id: 1,
                chain_type: "evm".to_string(),
            },
        );
        Arc::new(Mutex::new(AppStateInner {
            accounts,
            chains,
            rules,
            allow_list: allow_list.into_iter().map(String::from).collect(),
            hsm_gateway: None,
        }))
    }

    fn local_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 54321)
    }

    fn post_request(path: &str, data: &serde_json::Value, addr: SocketAddr) -> Request<Body> {
        let envelope = serde_json::json!({ "data": data.to_string() });
        let mut req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(envelope.to_string()))
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    async fn response_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn illegal_ip_is_rejected() {
        let state = test_state("[]", vec!["10.0.0.1"]);
        let app = routes().with_state(state);
        let req = post_request("/v1/sign/message", &serde_json::json!({}), local_addr());

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = response_json(resp).await;
        assert_eq!(body["code"], 4007);
    }

    #[tokio::test]
    async fn unknown_chain_id_is_rejected() {
        let state = test_state("[]", vec![LOCAL_IP]);
        let app = routes().with_state(state);
        let signer = test_signer();
        let data = serde_json::json!({
            "chain_id": 999,
            "account": signer.address().to_string(),
            "message": "hello",
        });
        let req = post_request("/v1/sign/message", &data, local_addr());

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = response_json(resp).await;
        assert_eq!(body["code"], 4001);
    }

    #[tokio::test]
    async fn successful_personal_sign_returns_valid_signature() {
        let rule_json = r#"[{"name":"allow-hello","chain_id":1,"conditions":[{"field":"message","symbol":"contains","value":"hello"}]}]"#;
        let state = test_state(rule_json, vec![LOCAL_IP]);
        let app = routes().with_state(state);
        let signer = test_signer();
        let data = serde_json::json!({
            "chain_id": 1,
            "account": signer.address().to_string(),
            "message": "hello",
        });
        let req = post_request("/v1/sign/message", &data, local_addr());

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = response_json(resp).await;
        let sig_hex = body["data"].as_str().unwrap();
        let sig_bytes = hex::decode(sig_hex.trim_start_matches("0x")).unwrap();
        assert_eq!(sig_bytes.len(), 65);
        assert!(sig_bytes[64] == 27 || sig_bytes[64] == 28);
    }
}
