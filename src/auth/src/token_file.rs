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

//! Persists a single IAM token, and its expiration time, to disk.
//!
//! Some credentials are expensive to refresh. For example, the federation flow
//! requires a browser round-trip. Persisting the token allows subsequent runs
//! of the application to skip that step until the token expires.
//!
//! Loading is best-effort: a missing or corrupted file is treated as "no
//! cached token". The file contains sensitive material, it is only readable
//! by its owner.

use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TokenFile {
    path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
    iam_token: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

impl TokenFile {
    /// A cache file for `identity` in the `dir` directory.
    pub fn new<P: Into<PathBuf>>(dir: P, identity: &str) -> Self {
        let path = dir.into().join(format!("{identity}.json"));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached token, if any.
    ///
    /// Credentials load their cache while they are constructed, which is not
    /// an async context.
    pub fn load(&self) -> Option<Token> {
        let contents = match std::fs::read(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("no cached token in {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_slice::<CachedToken>(&contents) {
            Ok(c) => Some(Token::bearer(c.iam_token, Some(c.expires_at))),
            Err(e) => {
                tracing::debug!("ignoring corrupted token cache {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Saves `token`, creating the containing directory if needed.
    pub async fn save(&self, token: &Token) -> std::io::Result<()> {
        let Some(expires_at) = token.expires_at else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "only tokens with an expiration time can be cached",
            ));
        };
        let cached = CachedToken {
            iam_token: token.token.clone(),
            expires_at,
        };
        let contents = serde_json::to_vec(&cached)?;
        if let Some(dir) = self.path.parent() {
            create_dir(dir).await?;
        }
        write_private(&self.path, &contents).await
    }
}

#[cfg(unix)]
async fn create_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .await
}

#[cfg(not(unix))]
async fn create_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

#[cfg(unix)]
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    // `mode()` only applies to new files.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await?;
    file.write_all(contents).await?;
    file.flush().await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, contents).await
}
