//! Startup-built, immutable application state: account tables, chain
//! table, and rule list, all guarded by one mutex per spec §5 (read-mostly;
//! contention is negligible since nothing writes after startup).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use signer_core::account::{ev_mnemonic, mnemonic, Account, AccountTable};
use signer_core::rules::Rules;
use signer_core::CoreError;
use signer_hsm::account as hsm_account;
use signer_hsm::Pkcs11Gateway;

use crate::config::{AccountConfig, ChainConfig, Config};

pub struct AppStateInner {
    pub accounts: AccountTable,
    pub chains: HashMap<String, ChainConfig>,
    pub rules: Rules,
    pub allow_list: Vec<String>,
    /// Kept alive for the process lifetime; HSM accounts borrow its
    /// session indirectly through key ids resolved at startup.
    pub hsm_gateway: Option<Pkcs11Gateway>,
}

pub type AppState = Arc<Mutex<AppStateInner>>;

fn resolve_password(configured: &str, label: &str) -> Result<String, CoreError> {
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    let prompted = rpassword::prompt_password(format!("password for {label}: "))
        .unwrap_or_default();
    if prompted.is_empty() {
        return Err(CoreError::EmptyPassword(label.to_string()));
    }
    Ok(prompted)
}

/// Builds every configured account, opening the shared HSM gateway lazily
/// the first time an HSM/MultiHSM/EvMnemonic-with-hsm-entries provider
/// needs it.
fn build_accounts(config: &Config) -> Result<(Vec<Account>, Option<Pkcs11Gateway>), CoreError> {
    let mut accounts = Vec::new();
    let mut gateway: Option<Pkcs11Gateway> = None;

    for entry in &config.account {
        match entry {
            AccountConfig::RawPrivateKey { index, private_key } => {
                accounts.push(signer_core::account::raw::load(*index, private_key)?);
            }
            AccountConfig::Keystore { index, path, pass } => {
                let password = resolve_password(pass, &format!("keystore[{index}]"))?;
                accounts.push(signer_core::account::keystore::load(*index, path, &password)?);
            }
            AccountConfig::PlainMnemonic {
                index_range,
                mnemonic,
            } => {
                accounts.extend(mnemonic::load_plain(index_range, mnemonic)?);
            }
            AccountConfig::EncryptedMnemonic {
                index_range,
                path,
                pass,
            } => {
                let password = resolve_password(pass, "encrypted_mnemonic")?;
                accounts.extend(mnemonic::load_encrypted(index_range, path, &password)?);
            }
            AccountConfig::EvMnemonic { entries } => {
                let mut resolved_hsm = Vec::new();
                for sub_entry in entries {
                    if let ev_mnemonic::EvMnemonicEntry::Hsm {
                        index,
                        key_id,
                        module_path,
                        slot_index,
                        pin,
                    } = sub_entry
                    {
                        let gw = match &gateway {
                            Some(gw) => gw,
                            None => {
                                let password = resolve_password(pin, "ev_mnemonic hsm entry")?;
                                let new_gateway = Pkcs11Gateway::open(module_path, *slot_index, &password)
                                    .map_err(|e| CoreError::SigningFailed(e.to_string()))?;
                                gateway = Some(new_gateway);
                                gateway.as_ref().unwrap()
                            }
                        };
                        let (_, address) = gw
                            .get_public_key(*key_id)
                            .map_err(|e| CoreError::SigningFailed(e.to_string()))?;
                        resolved_hsm.push(ev_mnemonic::ResolvedHsmAccount {
                            index: *index,
                            address,
                            key_id: *key_id,
                        });
                    }
                }
                accounts.extend(ev_mnemonic::load(entries.clone(), &resolved_hsm).map_err(CoreError::from)?);
            }
            AccountConfig::Hsm {
                index,
                key_id,
                module_path,
                slot_index,
                pin,
            } => {
                let gw = match &gateway {
                    Some(gw) => gw,
                    None => {
                        let password = resolve_password(pin, "hsm")?;
                        let new_gateway = Pkcs11Gateway::open(module_path, *slot_index, &password)
                            .map_err(|e| CoreError::SigningFailed(e.to_string()))?;
                        gateway = Some(new_gateway);
                        gateway.as_ref().unwrap()
                    }
                };
                let account = hsm_account::load_single(gw, *index, *key_id)
                    .map_err(|e| CoreError::SigningFailed(e.to_string()))?;
                accounts.push(account);
            }
            AccountConfig::MultiHsm {
                key_id_range,
                module_path,
                slot_index,
                pin,
            } => {
                let gw = match &gateway {
                    Some(gw) => gw,
                    None => {
                        let password = resolve_password(pin, "multi_hsm")?;
                        let new_gateway = Pkcs11Gateway::open(module_path, *slot_index, &password)
                            .map_err(|e| CoreError::SigningFailed(e.to_string()))?;
                        gateway = Some(new_gateway);
                        gateway.as_ref().unwrap()
                    }
                };
                accounts.extend(
                    hsm_account::load_multi(gw, key_id_range)
                        .map_err(|e| CoreError::SigningFailed(e.to_string()))?,
                );
            }
        }
    }

    Ok((accounts, gateway))
}

pub fn build_state(config: Config, rules: Rules) -> Result<AppState, CoreError> {
    let (accounts, hsm_gateway) = build_accounts(&config)?;
    let accounts = AccountTable::build(accounts)?;
    Ok(Arc::new(Mutex::new(AppStateInner {
        accounts,
        chains: config.chains,
        rules,
        allow_list: config.auth.allow_list(),
        hsm_gateway,
    })))
}
