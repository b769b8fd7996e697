//! YAML server configuration and JSON rule file loading (spec §6.3).
//!
//! Config is searched for in `./conf`, `../conf`, `../../conf` — the first
//! of those that exists (as a file, or a directory containing
//! `config.yaml`/`config.yml`) wins, matching the teacher's layered
//! config-path convention in spirit even though the on-disk format here is
//! YAML rather than JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config file found in ./conf, ../conf, ../../conf")]
    NotFound,
    #[error("failed to read config file {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    YamlParse(PathBuf, serde_yaml::Error),
    #[error("failed to read rule file {0}: {1}")]
    RuleFileRead(PathBuf, std::io::Error),
    #[error("rule file must have a .json extension, got {0}")]
    InvalidRuleFileExtension(PathBuf),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    80
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub rotation: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Comma-separated allow-list; membership is exact-string comparison
    /// (spec §3).
    pub ip: String,
}

impl AuthConfig {
    pub fn allow_list(&self) -> Vec<String> {
        self.ip.split(',').map(|s| s.trim().to_string()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    #[serde(default = "default_chain_type")]
    pub chain_type: String,
}

fn default_chain_type() -> String {
    "evm".to_string()
}

/// Raw account-provider configuration, tagged by `type`, mirroring the
/// provider kinds in spec §4.5. `signer-core`/`signer-hsm` own the actual
/// loading logic; this struct is purely the wire shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountConfig {
    RawPrivateKey {
        index: i64,
        private_key: String,
    },
    Keystore {
        index: i64,
        path: PathBuf,
        #[serde(default)]
        pass: String,
    },
    PlainMnemonic {
        index_range: String,
        mnemonic: String,
    },
    EncryptedMnemonic {
        index_range: String,
        path: PathBuf,
        #[serde(default)]
        pass: String,
    },
    EvMnemonic {
        entries: Vec<signer_core::account::ev_mnemonic::EvMnemonicEntry>,
    },
    Hsm {
        index: i64,
        key_id: u64,
        module_path: PathBuf,
        #[serde(default)]
        slot_index: usize,
        #[serde(default)]
        pin: String,
    },
    MultiHsm {
        key_id_range: String,
        module_path: PathBuf,
        #[serde(default)]
        slot_index: usize,
        #[serde(default)]
        pin: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub account: Vec<AccountConfig>,
    pub chains: std::collections::HashMap<String, ChainConfig>,
    pub auth: AuthConfig,
    pub listen: ListenConfig,
    #[serde(default)]
    pub log: LogConfigOrDefault,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfigOrDefault(pub LogConfig);

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            file: None,
            rotation: None,
        }
    }
}

impl<'de> Deserialize<'de> for LogConfigOrDefault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        LogConfig::deserialize(deserializer).map(LogConfigOrDefault)
    }
}

/// Searches `./conf`, `../conf`, `../../conf` for a config file, preferring
/// `config.yaml`/`config.yml` when the candidate is a directory.
fn find_config_path() -> Option<PathBuf> {
    for base in ["conf", "../conf", "../../conf"] {
        let base = Path::new(base);
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        if base.is_dir() {
            for name in ["config.yaml", "config.yml"] {
                let candidate = base.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = find_config_path().ok_or(ConfigError::NotFound)?;
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::YamlParse(path.to_path_buf(), e))
    }
}

/// Loads the JSON rule file named by `--rule` (default `rule.json`),
/// rejecting any extension other than `.json` (spec §6.3).
pub fn load_rule_file(path: &Path) -> Result<signer_core::rules::Rules, ConfigError> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(ConfigError::InvalidRuleFileExtension(path.to_path_buf()));
    }
    let contents =
        fs::read_to_string(path).map_err(|e| ConfigError::RuleFileRead(path.to_path_buf(), e))?;
    signer_core::rules::Rules::load(&contents)
        .map_err(|e| ConfigError::RuleFileRead(path.to_path_buf(), std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_json_rule_extension() {
        let err = load_rule_file(Path::new("rule.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRuleFileExtension(_)));
    }

    #[test]
    fn allow_list_splits_on_comma_and_trims() {
        let auth = AuthConfig {
            ip: " 127.0.0.1, 10.0.0.1 ".to_string(),
        };
        assert_eq!(auth.allow_list(), vec!["127.0.0.1", "10.0.0.1"]);
    }
}
