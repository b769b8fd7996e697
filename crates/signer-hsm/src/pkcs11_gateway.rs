//! PKCS#11 session management and the sign/verify/recover loop (spec
//! §4.6). A single session is opened once at startup and held behind a
//! mutex spanning sign-init → sign → verify-loop, since a PKCS#11 session
//! is not thread-safe (spec §5).

use std::path::Path;
use std::sync::Mutex;

use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::mechanism::Mechanism;
use cryptoki::object::{Attribute, AttributeType, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::types::AuthPin;
use k256::elliptic_curve::sec1::FromEncodedPoint;

use signer_core::signature::recover_and_match;

use crate::error::HsmError;

/// The verify-then-recover loop is a correctness retry, not a policy
/// retry (spec §9): bounded here so a pathological HSM can't hang a
/// request indefinitely.
const MAX_SIGN_ATTEMPTS: usize = 3;

pub struct Pkcs11Gateway {
    session: Mutex<Session>,
}

impl Pkcs11Gateway {
    /// Opens the PKCS#11 module, logs in with `pin`, and holds the
    /// resulting session for the lifetime of the gateway.
    pub fn open(module_path: &Path, slot_index: usize, pin: &str) -> Result<Self, HsmError> {
        let pkcs11 = Pkcs11::new(module_path).map_err(|e| HsmError::Transport(e.to_string()))?;
        pkcs11
            .initialize(CInitializeArgs::OsThreads)
            .map_err(|e| HsmError::Transport(e.to_string()))?;
        let slots = pkcs11
            .get_slots_with_token()
            .map_err(|e| HsmError::Transport(e.to_string()))?;
        let slot = *slots
            .get(slot_index)
            .ok_or_else(|| HsmError::Transport(format!("no token present at slot index {slot_index}")))?;
        let session = pkcs11
            .open_session_no_callback(slot, true)
            .map_err(|e| HsmError::Transport(e.to_string()))?;
        session
            .login(UserType::User, Some(&AuthPin::new(pin.to_string())))
            .map_err(|e| HsmError::Transport(e.to_string()))?;
        Ok(Pkcs11Gateway {
            session: Mutex::new(session),
        })
    }

    fn find_key(session: &Session, key_id: u64) -> Result<ObjectHandle, HsmError> {
        let template = [Attribute::Id(key_id.to_be_bytes().to_vec())];
        let handles = session
            .find_objects(&template)
            .map_err(|e| HsmError::Transport(e.to_string()))?;
        handles
            .into_iter()
            .next()
            .ok_or(HsmError::KeyNotFound(key_id))
    }

    fn ec_point(session: &Session, handle: ObjectHandle, key_id: u64) -> Result<Vec<u8>, HsmError> {
        let attrs = session
            .get_attributes(handle, &[AttributeType::EcPoint])
            .map_err(|e| HsmError::Transport(e.to_string()))?;
        let der_point = attrs
            .into_iter()
            .find_map(|a| match a {
                Attribute::EcPoint(bytes) => Some(bytes),
                _ => None,
            })
            .ok_or(HsmError::KeyNotFound(key_id))?;
        unwrap_ec_point(&der_point)
    }

    /// Retrieves the uncompressed EC point for `key_id` (validating the
    /// `0x04 || X(32) || Y(32)` shape) and derives the Ethereum address
    /// from it.
    pub fn get_public_key(&self, key_id: u64) -> Result<(Vec<u8>, Address), HsmError> {
        let session = self.session.lock().expect("hsm session mutex poisoned");
        let handle = Self::find_key(&session, key_id)?;
        let point = Self::ec_point(&session, handle, key_id)?;
        let address = address_from_uncompressed_point(&point)?;
        Ok((point, address))
    }

    /// Signs `hash` (exactly 32 bytes) and returns a complete `(r,s,v)`
    /// signature, per the three-step algorithm in spec §4.6: sign via
    /// `CKM_ECDSA`, verify against the stored public key, and determine
    /// the recovery id by recover-and-match. Retries the whole loop up to
    /// [`MAX_SIGN_ATTEMPTS`] times before surfacing a hard failure.
    pub fn sign_hash(&self, key_id: u64, hash: B256) -> Result<Signature, HsmError> {
        let session = self.session.lock().expect("hsm session mutex poisoned");
        let handle = Self::find_key(&session, key_id)?;
        let point = Self::ec_point(&session, handle, key_id)?;
        let address = address_from_uncompressed_point(&point)?;

        for attempt in 0..MAX_SIGN_ATTEMPTS {
            let raw_sig = session
                .sign(&Mechanism::Ecdsa, handle, hash.as_slice())
                .map_err(|e| HsmError::Transport(e.to_string()))?;
            if raw_sig.len() != 64 {
                return Err(HsmError::SigningFailed(format!(
                    "unexpected signature length {}",
                    raw_sig.len()
                )));
            }
            let r = U256::from_be_slice(&raw_sig[..32]);
            let s = U256::from_be_slice(&raw_sig[32..]);

            if session
                .verify(&Mechanism::Ecdsa, handle, hash.as_slice(), &raw_sig)
                .is_err()
            {
                tracing::warn!(key_id, attempt, "hsm signature failed verification, retrying");
                continue;
            }

            match recover_and_match(hash, r, s, address) {
                Ok(sig) => return Ok(sig),
                Err(_) => {
                    tracing::warn!(key_id, attempt, "hsm signature did not recover bound address, retrying");
                    continue;
                }
            }
        }
        Err(HsmError::SigningFailed(format!(
            "exceeded {MAX_SIGN_ATTEMPTS} sign/verify/recover attempts"
        )))
    }
}

/// `CKA_EC_POINT` is a DER `OCTET STRING` wrapping the raw EC point bytes.
fn unwrap_ec_point(der: &[u8]) -> Result<Vec<u8>, HsmError> {
    asn1::parse_single::<&[u8]>(der)
        .map(|s| s.to_vec())
        .map_err(|_| HsmError::InvalidPublicKey)
}

/// Validates shape (`0x04 || X(32) || Y(32)`) and that the point lies on
/// the secp256k1 curve (spec §4.6), mirroring the Go original's reliance
/// on `crypto.UnmarshalPubkey` (`elliptic.Unmarshal` rejects off-curve
/// points) rather than trusting the HSM's encoding at face value.
fn address_from_uncompressed_point(point: &[u8]) -> Result<Address, HsmError> {
    if point.len() != 65 || point[0] != 0x04 {
        return Err(HsmError::InvalidPublicKey);
    }
    let encoded = k256::EncodedPoint::from_bytes(point).map_err(|_| HsmError::InvalidPublicKey)?;
    if bool::from(k256::AffinePoint::from_encoded_point(&encoded).is_none()) {
        return Err(HsmError::InvalidPublicKey);
    }
    let hash = keccak256(&point[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_point_with_wrong_prefix() {
        let mut point = vec![0u8; 65];
        point[0] = 0x03;
        assert!(address_from_uncompressed_point(&point).is_err());
    }

    #[test]
    fn rejects_point_with_wrong_length() {
        let point = vec![0x04; 64];
        assert!(address_from_uncompressed_point(&point).is_err());
    }

    #[test]
    fn rejects_off_curve_point() {
        let mut point = vec![0x04];
        point.extend_from_slice(&[0xAB; 64]);
        assert!(address_from_uncompressed_point(&point).is_err());
    }

    #[test]
    fn accepts_well_formed_point() {
        // secp256k1 generator point G — a well-known, public curve point.
        let gx = hex::decode("79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798")
            .unwrap();
        let gy = hex::decode("483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8")
            .unwrap();
        let mut point = vec![0x04];
        point.extend_from_slice(&gx);
        point.extend_from_slice(&gy);
        assert!(address_from_uncompressed_point(&point).is_ok());
    }
}
