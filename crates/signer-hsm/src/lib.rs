//! HSM-backed account providers and the PKCS#11 session gateway they sit
//! on top of. Kept in its own crate so that `signer-core` (and anything
//! that only needs software signing) never has to link a PKCS#11 library.

pub mod account;
pub mod error;
pub mod pkcs11_gateway;

pub use error::HsmError;
pub use pkcs11_gateway::Pkcs11Gateway;
