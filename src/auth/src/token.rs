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

//! Types and functions to work with IAM tokens.

use crate::Result;
use time::OffsetDateTime;

/// Represents an IAM token.
#[derive(Clone, PartialEq)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in `Authorization:` header.
    pub token: String,

    /// The type of the token.
    ///
    /// Only `"Bearer"` tokens are issued by the DoubleCloud API.
    pub token_type: String,

    /// The time at which the token expires.
    ///
    /// If `None`, the token does not expire. Only static IAM tokens, provided
    /// by the application, have no expiration time.
    pub expires_at: Option<OffsetDateTime>,
}

impl Token {
    /// Creates a new bearer token.
    pub fn bearer<T: Into<String>>(token: T, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            token: token.into(),
            token_type: crate::constants::BEARER.to_string(),
            expires_at,
        }
    }

    /// Returns `true` if the token can be used at `now`.
    ///
    /// A token is valid strictly before its expiration time. At the expiration
    /// time, or after it, the token must be refreshed. Empty tokens are never
    /// valid.
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        !self.token.is_empty() && self.expires_at.is_none_or(|e| now < e)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait::async_trait]
pub(crate) trait TokenProvider: std::fmt::Debug + Send + Sync {
    async fn token(&self) -> Result<Token>;
}
