//! `HSM` and `MultiHSM` account providers — accounts bound to one or more
//! PKCS#11 private key ids sharing a single gateway session (spec §4.5).

use signer_core::account::Account;
use signer_core::range::parse_range;

use crate::error::HsmError;
use crate::pkcs11_gateway::Pkcs11Gateway;

/// One account bound to a specific HSM private key id; the address comes
/// from the HSM's own public key, not from configuration.
pub fn load_single(gateway: &Pkcs11Gateway, index: i64, key_id: u64) -> Result<Account, HsmError> {
    let (_, address) = gateway.get_public_key(key_id)?;
    Ok(Account::hsm(index, address, key_id))
}

/// Accounts over a range-parsed list of HSM private key ids, all sharing
/// `gateway`'s single session. The account `index` equals its key id.
pub fn load_multi(gateway: &Pkcs11Gateway, key_id_range: &str) -> Result<Vec<Account>, HsmError> {
    let key_ids = parse_range(key_id_range)?;
    key_ids
        .into_iter()
        .map(|key_id| load_single(gateway, key_id as i64, key_id))
        .collect()
}
