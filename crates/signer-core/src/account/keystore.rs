//! `Keystore` provider — one account from a V3 JSON keystore file
//! decrypted with a password (spec §4.5).

use std::path::Path;

use alloy_signer_local::PrivateKeySigner;

use crate::account::Account;
use crate::error::CoreError;

/// Decrypts a V3 keystore at `path` with `password` and builds the
/// resulting account. An empty `password` is accepted here — the empty
/// password prompt fallback (spec §4.5 "Password prompting") is the
/// caller's responsibility, not this provider's.
pub fn load(index: i64, path: &Path, password: &str) -> Result<Account, CoreError> {
    let key_bytes = eth_keystore::decrypt_key(path, password)
        .map_err(|e| CoreError::Keystore(format!("{}: {e}", path.display())))?;
    let signer = PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| CoreError::Keystore(format!("decrypted key invalid: {e}")))?;
    Ok(Account::software(index, signer))
}
