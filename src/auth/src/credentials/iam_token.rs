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

//! Credentials backed by an IAM token obtained out of band.
//!
//! For example, a token printed by the `dc` CLI. The token is returned as-is,
//! the application is responsible for replacing the credentials before the
//! token expires.
//!
//! ```
//! # use doublecloud_auth::credentials::iam_token::Builder;
//! let credentials = Builder::new(std::env::var("DC_IAM_TOKEN").unwrap_or_default()).build();
//! ```

use crate::credentials::{Credentials, NonExchangeableCredentials, Result};
use crate::token::Token;
use std::sync::Arc;

#[derive(Debug)]
struct IamTokenCredentials {
    token: Token,
}

/// A builder for static IAM token credentials.
#[derive(Debug)]
pub struct Builder {
    token: String,
}

impl Builder {
    pub fn new<T: Into<String>>(token: T) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Returns a [Credentials] instance.
    pub fn build(self) -> Credentials {
        Credentials::NonExchangeable(Arc::new(IamTokenCredentials {
            token: Token::bearer(self.token, None),
        }))
    }
}

#[async_trait::async_trait]
impl NonExchangeableCredentials for IamTokenCredentials {
    async fn iam_token(&self) -> Result<Token> {
        Ok(self.token.clone())
    }
}
