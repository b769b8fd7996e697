//! The wire error taxonomy (spec §6.2, §7) and its mapping onto the
//! `{code, msg, data}` HTTP envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("{0}")]
    InvalidFormData(String),
    #[error("{0}")]
    ChainError(String),
    #[error("{0}")]
    SignError(String),
    #[error("{0}")]
    AuthError(String),
    #[error("{0}")]
    InternalError(String),
    #[error("{0}")]
    HeaderError(String),
    #[error("{0}")]
    ExpiredRequest(String),
    #[error("{0}")]
    IllegalAccess(String),
    #[error("{0}")]
    IllegalTransaction(String),
    #[error("{0}")]
    ParseError(String),
    #[error("{0}")]
    ParamError(String),
    #[error("{0}")]
    ForbiddenError(String),
}

impl SignerError {
    pub fn code(&self) -> u32 {
        match self {
            SignerError::InvalidFormData(_) => 4000,
            SignerError::ChainError(_) => 4001,
            SignerError::SignError(_) => 4002,
            SignerError::AuthError(_) => 4003,
            SignerError::InternalError(_) => 4004,
            SignerError::HeaderError(_) => 4005,
            SignerError::ExpiredRequest(_) => 4006,
            SignerError::IllegalAccess(_) => 4007,
            SignerError::IllegalTransaction(_) => 4008,
            SignerError::ParseError(_) => 4009,
            SignerError::ParamError(_) => 4010,
            SignerError::ForbiddenError(_) => 4011,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: u32,
    msg: String,
    data: Option<()>,
}

impl IntoResponse for SignerError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            code: self.code(),
            msg: self.to_string(),
            data: None,
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl From<signer_core::CoreError> for SignerError {
    fn from(e: signer_core::CoreError) -> Self {
        use signer_core::CoreError::*;
        match e {
            InvalidRange(msg) => SignerError::InvalidFormData(msg),
            InvalidNumber { .. } => SignerError::InvalidFormData(e.to_string()),
            MalformedTransaction(_) => SignerError::InvalidFormData(e.to_string()),
            UnsupportedTxType(_) => SignerError::InvalidFormData(e.to_string()),
            MalformedTypedData(_) => SignerError::ParamError(e.to_string()),
            MalformedAbi(_) => SignerError::ParamError(e.to_string()),
            RecoveryFailed => SignerError::SignError(e.to_string()),
            SigningFailed(_) => SignerError::SignError(e.to_string()),
            UnknownAccount(_) => SignerError::InvalidFormData(e.to_string()),
            NoKeyMaterial => SignerError::InvalidFormData(e.to_string()),
            Keystore(_) => SignerError::SignError(e.to_string()),
            Mnemonic(_) => SignerError::SignError(e.to_string()),
            EmptyPassword(_) => SignerError::InternalError(e.to_string()),
            DuplicateAddress(_) => SignerError::InternalError(e.to_string()),
        }
    }
}
