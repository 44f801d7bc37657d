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

//! Types and functions to work with DoubleCloud credentials.
//!
//! [Credentials] is a closed set of authentication methods. Each method
//! exposes exactly one capability:
//!
//! * [ExchangeableCredentials] produce a signed [IamTokenRequest], which must
//!   be exchanged for an IAM token (see [crate::exchange]).
//! * [NonExchangeableCredentials] produce IAM tokens directly.
//!
//! Use the builders in the submodules to create credentials:
//!
//! ```
//! # use doublecloud_auth::credentials::{Credentials, iam_token};
//! let credentials = iam_token::Builder::new("my-iam-token").build();
//! assert!(matches!(credentials, Credentials::NonExchangeable(_)));
//! ```

pub mod federation;
pub mod iam_token;
pub mod no_credentials;
pub mod service_account;

use crate::token::Token;
use std::sync::Arc;

/// A `Result` alias where the `Err` case is [CredentialsError].
///
/// [CredentialsError]: crate::errors::CredentialsError
pub type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;

/// The authentication method used by the SDK.
///
/// Credentials are immutable after construction, and cheap to clone. Some
/// credentials, such as the [federation] flow, keep an internal token cache
/// shared by all the clones.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Credentials {
    /// Credentials that produce a signed request for an IAM token.
    Exchangeable(Arc<dyn ExchangeableCredentials>),
    /// Credentials that produce IAM tokens directly.
    NonExchangeable(Arc<dyn NonExchangeableCredentials>),
}

impl Credentials {
    /// Credentials that never authenticate.
    ///
    /// Any attempt to obtain a token fails with [UNAUTHENTICATED].
    ///
    /// [UNAUTHENTICATED]: crate::errors::UNAUTHENTICATED
    pub fn none() -> Self {
        no_credentials::Builder::new().build()
    }

    /// Wraps custom exchangeable credentials.
    pub fn from_exchangeable<T>(inner: T) -> Self
    where
        T: ExchangeableCredentials + 'static,
    {
        Self::Exchangeable(Arc::new(inner))
    }

    /// Wraps custom non-exchangeable credentials.
    pub fn from_non_exchangeable<T>(inner: T) -> Self
    where
        T: NonExchangeableCredentials + 'static,
    {
        Self::NonExchangeable(Arc::new(inner))
    }
}

/// Credentials that must be exchanged for an IAM token.
pub trait ExchangeableCredentials: std::fmt::Debug + Send + Sync {
    /// Creates a new, signed, request for an IAM token.
    ///
    /// `audience` is the URL of the endpoint that exchanges the request.
    fn iam_token_request(&self, audience: &str) -> Result<IamTokenRequest>;
}

/// Credentials that produce IAM tokens directly.
#[async_trait::async_trait]
pub trait NonExchangeableCredentials: std::fmt::Debug + Send + Sync {
    /// Returns an IAM token.
    async fn iam_token(&self) -> Result<Token>;
}

/// A signed request for an IAM token.
#[derive(Clone, PartialEq)]
pub struct IamTokenRequest {
    /// The signed JWT assertion.
    pub jwt: String,
}

impl std::fmt::Debug for IamTokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamTokenRequest")
            .field("jwt", &"[censored]")
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    mockall::mock! {
        #[derive(Debug)]
        pub ExchangeableCredentials { }

        impl ExchangeableCredentials for ExchangeableCredentials {
            fn iam_token_request(&self, audience: &str) -> Result<IamTokenRequest>;
        }
    }

    #[test]
    fn request_debug() {
        let request = IamTokenRequest {
            jwt: "header.claims.signature".into(),
        };
        let got = format!("{request:?}");
        assert!(!got.contains("header.claims"), "{got}");
        assert!(got.contains("[censored]"), "{got}");
    }

    #[tokio::test]
    async fn none() {
        let credentials = Credentials::none();
        let Credentials::NonExchangeable(inner) = credentials else {
            panic!("expected non-exchangeable credentials");
        };
        let err = inner.iam_token().await.unwrap_err();
        assert!(!err.is_retryable(), "{err:?}");
        assert!(
            err.to_string().contains(crate::errors::UNAUTHENTICATED),
            "{err}"
        );
    }

    #[test]
    fn from_custom() {
        let mut mock = MockExchangeableCredentials::new();
        mock.expect_iam_token_request().never();
        let credentials = Credentials::from_exchangeable(mock);
        assert!(matches!(credentials, Credentials::Exchangeable(_)));
    }
}
