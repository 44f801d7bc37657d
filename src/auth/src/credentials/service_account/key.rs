// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::BuildResult;
use crate::build_errors::Error as BuilderError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A service account key, as created by the DoubleCloud console or CLI.
///
/// The key files use either `snake_case` or `camelCase` field names, both are
/// accepted. Keys are written back using `snake_case`.
///
/// Service account keys are secrets, treat them as unencrypted passwords.
#[derive(Clone, Default, Deserialize, PartialEq, Serialize)]
pub struct ServiceAccountKey {
    /// The key id, sent as the `kid` of the signed assertions.
    #[serde(default)]
    pub id: String,
    /// The service account that owns this key.
    #[serde(
        default,
        alias = "serviceAccountId",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_account_id: Option<String>,
    /// Set for keys issued to user accounts. These keys cannot be used by the
    /// SDK.
    #[serde(
        default,
        alias = "userAccountId",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_account_id: Option<String>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(
        default,
        alias = "keyAlgorithm",
        skip_serializing_if = "Option::is_none"
    )]
    pub key_algorithm: Option<String>,
    #[serde(default, alias = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// The PEM-encoded RSA private key, in PKCS#8 or PKCS#1 format.
    #[serde(default, alias = "privateKey")]
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("id", &self.id)
            .field("service_account_id", &self.service_account_id)
            .field("user_account_id", &self.user_account_id)
            .field("created_at", &self.created_at)
            .field("key_algorithm", &self.key_algorithm)
            .field("public_key", &self.public_key)
            .field("private_key", &"[censored]")
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parses a key from its JSON representation.
    pub fn from_json_bytes(bytes: &[u8]) -> BuildResult<Self> {
        serde_json::from_slice(bytes).map_err(BuilderError::parsing)
    }

    /// Reads and parses a key file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let contents = std::fs::read(path.as_ref()).map_err(BuilderError::loading)?;
        Self::from_json_bytes(&contents)
    }

    /// Writes the key to `path`, readable only by its owner.
    pub fn write_to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let contents = serde_json::to_vec_pretty(self)?;
        write_private(path.as_ref(), &contents)
    }

    /// Returns the service account id, if the key can be used to sign
    /// assertions.
    pub(crate) fn validate(&self) -> BuildResult<&str> {
        if self.id.is_empty() {
            return Err(BuilderError::invalid_key("key id is missing"));
        }
        match (self.service_account_id.as_deref(), self.user_account_id.as_deref()) {
            (Some(sa), _) if !sa.is_empty() => Ok(sa),
            (_, Some(user)) if !user.is_empty() => Err(BuilderError::invalid_key(format!(
                "key should be issued for service account, but subject is user account \"{user}\""
            ))),
            _ => Err(BuilderError::invalid_key(
                "key should be issued for service account, but subject is missing",
            )),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
