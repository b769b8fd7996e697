//! Internal error type shared by every module in this crate.
//!
//! This enum carries no HTTP concerns (no status codes, no error-code
//! integers) — the server crate maps variants onto the wire error envelope.
//! Keeping that mapping out of here lets the core crate stay usable outside
//! an HTTP context (e.g. from a future CLI or test harness).

use alloy_primitives::Address;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid numeric field {field}: {value}")]
    InvalidNumber { field: String, value: String },

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("unsupported transaction type: {0}")]
    UnsupportedTxType(u8),

    #[error("malformed eip-712 typed data: {0}")]
    MalformedTypedData(String),

    #[error("malformed abi fragment: {0}")]
    MalformedAbi(String),

    #[error("recovery failed: no candidate v recovered the expected address")]
    RecoveryFailed,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("account not found for address {0}")]
    UnknownAccount(Address),

    #[error("account has no usable key material")]
    NoKeyMaterial,

    #[error("keystore error: {0}")]
    Keystore(String),

    #[error("mnemonic error: {0}")]
    Mnemonic(String),

    #[error("empty password for provider {0}")]
    EmptyPassword(String),

    #[error("duplicate address {0} across configured accounts")]
    DuplicateAddress(Address),
}
