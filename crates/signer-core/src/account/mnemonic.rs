//! `PlainMnemonic` and `EncryptedMnemonic` providers — BIP-39 mnemonic
//! derivation over a range-parsed set of indices, using derivation path
//! `m/44'/60'/0'/0/<index>` (spec §4.5).

use std::path::Path;

use alloy_signer_local::coins_bip39::English;
use alloy_signer_local::MnemonicBuilder;

use crate::account::Account;
use crate::error::CoreError;
use crate::range::parse_range;

fn derivation_path(index: u64) -> String {
    format!("m/44'/60'/0'/0/{index}")
}

/// Derives one account per index in `index_range` (parsed per §4.1) from a
/// plaintext BIP-39 `mnemonic`.
pub fn load_plain(index_range: &str, mnemonic: &str) -> Result<Vec<Account>, CoreError> {
    let indices = parse_range(index_range)?;
    let mut accounts = Vec::with_capacity(indices.len());
    for index in indices {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(mnemonic)
            .derivation_path(derivation_path(index))
            .map_err(|e| CoreError::Mnemonic(e.to_string()))?
            .build()
            .map_err(|e| CoreError::Mnemonic(e.to_string()))?;
        accounts.push(Account::software(index as i64, signer));
    }
    Ok(accounts)
}

/// Decrypts a V3-keystore-encrypted mnemonic plaintext, then derives
/// accounts exactly as [`load_plain`] does.
pub fn load_encrypted(
    index_range: &str,
    keystore_path: &Path,
    password: &str,
) -> Result<Vec<Account>, CoreError> {
    let plaintext_bytes = eth_keystore::decrypt_key(keystore_path, password)
        .map_err(|e| CoreError::Keystore(format!("{}: {e}", keystore_path.display())))?;
    let mnemonic = String::from_utf8(plaintext_bytes)
        .map_err(|_| CoreError::Mnemonic("decrypted mnemonic is not valid utf-8".into()))?;
    load_plain(index_range, mnemonic.trim())
}
