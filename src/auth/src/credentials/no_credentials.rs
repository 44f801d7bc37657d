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

//! Credentials that never authenticate.
//!
//! These are useful in tests, or to verify that an application fails cleanly
//! when it is not configured. The SDK fails every RPC before dialing any
//! connection.

use crate::credentials::{Credentials, NonExchangeableCredentials, Result};
use crate::errors::{CredentialsError, UNAUTHENTICATED};
use crate::token::Token;
use std::sync::Arc;

#[derive(Debug)]
struct NoCredentials;

/// A builder for credentials that never authenticate.
#[derive(Debug, Default)]
pub struct Builder {}

impl Builder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a [Credentials] instance.
    pub fn build(self) -> Credentials {
        Credentials::NonExchangeable(Arc::new(NoCredentials))
    }
}

#[async_trait::async_trait]
impl NonExchangeableCredentials for NoCredentials {
    async fn iam_token(&self) -> Result<Token> {
        Err(CredentialsError::non_retryable_from_msg(UNAUTHENTICATED))
    }
}
