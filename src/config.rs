// Configuration store: the YAML file mapping client names to their
// partner id, hardware id and OAuth token pair. The file is read before
// every operation and written back after a successful token refresh.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Access/refresh token pair of one client entry. The field names match
/// both the config file and the OAuth token-endpoint response, so the
/// same struct deserializes either (extra JSON fields like `expires_in`
/// are ignored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// One client entry in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub partner_id: u32,
    pub hardware_id: String,
    pub tokens: Tokens,
}

/// The whole config file: a `client` mapping keyed by client name.
/// Entries live in a `BTreeMap` so the file is rewritten with client
/// names in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "client")]
    pub clients: BTreeMap<String, ClientConfig>,
}

impl Config {
    /// Parse the YAML config file at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize the config back to `path`, overwriting its contents.
    pub fn write(&self, path: &Path) -> Result<()> {
        let raw = serde_yaml::to_string(self).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, raw).map_err(|source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Borrow the entry for `name`.
    pub fn client(&self, name: &str) -> Result<&ClientConfig> {
        self.clients
            .get(name)
            .ok_or_else(|| Error::UnknownClient(name.to_string()))
    }

    /// Mutably borrow the entry for `name`.
    pub fn client_mut(&mut self, name: &str) -> Result<&mut ClientConfig> {
        self.clients
            .get_mut(name)
            .ok_or_else(|| Error::UnknownClient(name.to_string()))
    }
}
