//! The account abstraction: a uniform interface over every key-storage
//! strategy spec §4.5 names. Software-held strategies are implemented in
//! this crate; HSM-backed strategies are implemented in the sibling
//! `signer-hsm` crate and plug into the same [`Account`]/[`KeySource`]
//! shape so the request orchestrator never has to know which one it holds.

pub mod ev_mnemonic;
pub mod keystore;
pub mod mnemonic;
pub mod raw;

use std::collections::HashMap;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;

use crate::error::CoreError;

/// Where an account's signing capability comes from. HSM accounts carry
/// only the key id here — the actual PKCS#11 session lives in `signer-hsm`
/// and is looked up by `hsm_key_id` at sign time.
#[derive(Debug, Clone)]
pub enum KeySource {
    Software(PrivateKeySigner),
    Hsm { key_id: u64 },
}

/// One configured signing identity. Created at startup, immutable
/// thereafter, destroyed at shutdown (spec §3).
#[derive(Debug, Clone)]
pub struct Account {
    pub index: i64,
    pub address: Address,
    pub key: KeySource,
}

impl Account {
    pub fn software(index: i64, signer: PrivateKeySigner) -> Self {
        Account {
            index,
            address: signer.address(),
            key: KeySource::Software(signer),
        }
    }

    pub fn hsm(index: i64, address: Address, key_id: u64) -> Self {
        Account {
            index,
            address,
            key: KeySource::Hsm { key_id },
        }
    }
}

/// Two lookup tables over the same set of accounts, by lowercased address
/// and by derivation/object index (spec §3). Built once at startup; an
/// address collision across accounts is treated as a fatal configuration
/// error — see `DESIGN.md` for why this resolves the spec's open question
/// in favor of "fatal" rather than "last write wins".
pub struct AccountTable {
    by_address: HashMap<Address, Account>,
    by_index: HashMap<i64, Account>,
}

impl AccountTable {
    pub fn build(accounts: Vec<Account>) -> Result<Self, CoreError> {
        let mut by_address = HashMap::with_capacity(accounts.len());
        let mut by_index = HashMap::with_capacity(accounts.len());
        for account in accounts {
            if by_address.contains_key(&account.address) {
                return Err(CoreError::DuplicateAddress(account.address));
            }
            by_index.insert(account.index, account.clone());
            by_address.insert(account.address, account);
        }
        Ok(AccountTable {
            by_address,
            by_index,
        })
    }

    pub fn by_address(&self, address: &Address) -> Option<&Account> {
        self.by_address.get(address)
    }

    pub fn by_index(&self, index: i64) -> Option<&Account> {
        self.by_index.get(&index)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(hex: &str) -> PrivateKeySigner {
        hex.parse().unwrap()
    }

    #[test]
    fn builds_both_lookup_tables() {
        let a = Account::software(
            0,
            signer("0x0123456789012345678901234567890123456789012345678901234567cdef"),
        );
        let addr = a.address;
        let table = AccountTable::build(vec![a]).unwrap();
        assert_eq!(table.by_address(&addr).unwrap().index, 0);
        assert_eq!(table.by_index(0).unwrap().address, addr);
    }

    #[test]
    fn rejects_duplicate_address() {
        let a1 = Account::software(
            0,
            signer("0x0123456789012345678901234567890123456789012345678901234567cdef"),
        );
        let a2 = Account::software(
            1,
            signer("0x0123456789012345678901234567890123456789012345678901234567cdef"),
        );
        assert!(AccountTable::build(vec![a1, a2]).is_err());
    }
}
