//! `EvMnemonic` provider — a heterogeneous collection of entries, each
//! independently configured as one of the other provider kinds. Keystore
//! passwords may be inherited from the previous entry when
//! `use_last_pass = true` (spec §3, §4.5).

use std::path::PathBuf;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::account::{keystore, mnemonic, raw, Account};
use crate::error::CoreError;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvMnemonicEntry {
    RawPrivateKey {
        index: i64,
        private_key: String,
    },
    Keystore {
        index: i64,
        path: PathBuf,
        #[serde(default)]
        pass: String,
        #[serde(default)]
        use_last_pass: bool,
    },
    PlainMnemonic {
        index_range: String,
        mnemonic: String,
    },
    /// HSM entries are resolved externally — signer-core has no PKCS#11
    /// dependency. The caller supplies the resolved address via
    /// [`ResolvedHsmAccount`] before calling [`load`]; `module_path`,
    /// `slot_index` and `pin` are carried on the entry itself so the
    /// caller knows which gateway to open (or reuse) to resolve it.
    Hsm {
        index: i64,
        key_id: u64,
        module_path: PathBuf,
        #[serde(default)]
        slot_index: usize,
        #[serde(default)]
        pin: String,
    },
}

/// An HSM account already resolved (public key fetched, address derived)
/// by the caller, keyed by the same `(index, key_id)` pair the entry
/// declares.
pub struct ResolvedHsmAccount {
    pub index: i64,
    pub address: Address,
    pub key_id: u64,
}

/// Builds accounts for every entry, inheriting keystore passwords across
/// adjacent entries when requested. A misconfigured entry is logged as a
/// warning and skipped rather than aborting the whole list — only when
/// every entry fails (zero accounts produced) is the error surfaced to the
/// caller as fatal (spec §3, §9).
pub fn load(
    entries: Vec<EvMnemonicEntry>,
    resolved_hsm: &[ResolvedHsmAccount],
) -> Result<Vec<Account>, CoreError> {
    let had_entries = !entries.is_empty();
    let mut accounts = Vec::new();
    let mut last_pass: Option<String> = None;
    let mut last_error: Option<CoreError> = None;

    for entry in entries {
        let loaded: Result<Vec<Account>, CoreError> = match entry {
            EvMnemonicEntry::RawPrivateKey { index, private_key } => {
                raw::load(index, &private_key).map(|a| vec![a])
            }
            EvMnemonicEntry::Keystore {
                index,
                path,
                pass,
                use_last_pass,
            } => (|| {
                let password = if use_last_pass && pass.is_empty() {
                    last_pass.clone().ok_or_else(|| {
                        CoreError::EmptyPassword(format!(
                            "ev_mnemonic[{index}] (no prior pass to inherit)"
                        ))
                    })?
                } else {
                    pass.clone()
                };
                let account = keystore::load(index, &path, &password)?;
                last_pass = Some(password);
                Ok(vec![account])
            })(),
            EvMnemonicEntry::PlainMnemonic {
                index_range,
                mnemonic,
            } => mnemonic::load_plain(&index_range, &mnemonic),
            EvMnemonicEntry::Hsm {
                index, key_id, ..
            } => resolved_hsm
                .iter()
                .find(|a| a.index == index && a.key_id == key_id)
                .map(|resolved| vec![Account::hsm(resolved.index, resolved.address, resolved.key_id)])
                .ok_or_else(|| {
                    CoreError::SigningFailed(format!(
                        "unresolved hsm entry at index {index} (key id {key_id})"
                    ))
                }),
        };

        match loaded {
            Ok(mut new_accounts) => accounts.append(&mut new_accounts),
            Err(e) => {
                tracing::warn!(error = %e, "ev_mnemonic entry failed to load, skipping index");
                last_error = Some(e);
            }
        }
    }

    if had_entries && accounts.is_empty() {
        return Err(last_error.expect("at least one entry failed if accounts stayed empty"));
    }
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_raw_and_mnemonic_entries_load() {
        let entries = vec![
            EvMnemonicEntry::RawPrivateKey {
                index: 0,
                private_key:
                    "0x0123456789012345678901234567890123456789012345678901234567cdef".into(),
            },
            EvMnemonicEntry::PlainMnemonic {
                index_range: "1-2".into(),
                mnemonic: "test test test test test test test test test test test junk".into(),
            },
        ];
        let accounts = load(entries, &[]).unwrap();
        assert_eq!(accounts.len(), 3);
    }

    #[test]
    fn resolved_hsm_entry_produces_hsm_account() {
        let entries = vec![EvMnemonicEntry::Hsm {
            index: 5,
            key_id: 42,
            module_path: PathBuf::from("/nonexistent.so"),
            slot_index: 0,
            pin: String::new(),
        }];
        let resolved = vec![ResolvedHsmAccount {
            index: 5,
            address: Address::repeat_byte(0x11),
            key_id: 42,
        }];
        let accounts = load(entries, &resolved).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].index, 5);
    }

    #[test]
    fn unresolved_hsm_entry_errors() {
        let entries = vec![EvMnemonicEntry::Hsm {
            index: 5,
            key_id: 42,
            module_path: PathBuf::from("/nonexistent.so"),
            slot_index: 0,
            pin: String::new(),
        }];
        assert!(load(entries, &[]).is_err());
    }

    #[test]
    fn one_misconfigured_entry_is_skipped_not_fatal() {
        let entries = vec![
            EvMnemonicEntry::RawPrivateKey {
                index: 0,
                private_key: "not-a-key".into(),
            },
            EvMnemonicEntry::RawPrivateKey {
                index: 1,
                private_key:
                    "0x0123456789012345678901234567890123456789012345678901234567cdef".into(),
            },
        ];
        let accounts = load(entries, &[]).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].index, 1);
    }

    #[test]
    fn all_entries_failing_is_fatal() {
        let entries = vec![EvMnemonicEntry::RawPrivateKey {
            index: 0,
            private_key: "not-a-key".into(),
        }];
        assert!(load(entries, &[]).is_err());
    }

    #[test]
    fn inherited_password_without_prior_entry_errors() {
        let entries = vec![EvMnemonicEntry::Keystore {
            index: 0,
            path: PathBuf::from("/nonexistent.json"),
            pass: String::new(),
            use_last_pass: true,
        }];
        assert!(load(entries, &[]).is_err());
    }
}
