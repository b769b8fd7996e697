//! `RawPrivateKey` provider — one account from a hex-encoded secp256k1
//! private key (spec §4.5).

use alloy_signer_local::PrivateKeySigner;

use crate::account::Account;
use crate::error::CoreError;

pub fn load(index: i64, private_key_hex: &str) -> Result<Account, CoreError> {
    let signer: PrivateKeySigner = private_key_hex
        .parse()
        .map_err(|e| CoreError::SigningFailed(format!("invalid private key: {e}")))?;
    Ok(Account::software(index, signer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_account_from_hex_key() {
        let account = load(
            0,
            "0x0123456789012345678901234567890123456789012345678901234567cdef",
        )
        .unwrap();
        assert_eq!(account.index, 0);
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(load(0, "not-a-key").is_err());
    }
}
