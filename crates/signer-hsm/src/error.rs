#[derive(Debug, thiserror::Error)]
pub enum HsmError {
    #[error("hsm transport error: {0}")]
    Transport(String),

    #[error("hsm key {0} not found")]
    KeyNotFound(u64),

    #[error("hsm returned an invalid public key encoding")]
    InvalidPublicKey,

    #[error("hsm signing failed: {0}")]
    SigningFailed(String),

    #[error(transparent)]
    Core(#[from] signer_core::CoreError),
}
