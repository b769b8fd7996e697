//! Core primitives for the EVM signing service: the canonical transaction
//! model, signing-hash derivation, EIP-712 hashing, the declarative rule
//! engine, and the account abstraction over software-held key material.
//!
//! [`crate::account`] holds the HSM-agnostic account providers; the PKCS#11
//! gateway and HSM-backed providers live in the sibling `signer-hsm` crate so
//! that this crate stays buildable without a PKCS#11 library present.

pub mod account;
pub mod eip712;
pub mod error;
pub mod hashing;
pub mod range;
pub mod rules;
pub mod signature;
pub mod tx;

pub use error::CoreError;
