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

//! Turns any [Credentials] into a source of valid IAM tokens.

use crate::clock::Clock;
use crate::credentials::{
    Credentials, ExchangeableCredentials, NonExchangeableCredentials, Result,
};
use crate::exchange::Exchanger;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use std::sync::Arc;

/// Returns IAM tokens for a given set of [Credentials].
///
/// Tokens produced by exchangeable credentials are cached until they expire.
/// When a token expires, only one exchange is in flight, even if many tasks
/// request a token at the same time. Non-exchangeable credentials manage their
/// own caching, if any.
///
/// Cloning a `TokenSource` shares the cache.
#[derive(Clone, Debug)]
pub struct TokenSource {
    inner: Inner,
}

#[derive(Clone, Debug)]
enum Inner {
    Exchange(TokenCache<ExchangeProvider>),
    Direct(Arc<dyn NonExchangeableCredentials>),
}

impl TokenSource {
    pub fn new(credentials: Credentials, exchanger: Exchanger, clock: Arc<dyn Clock>) -> Self {
        let inner = match credentials {
            Credentials::Exchangeable(credentials) => Inner::Exchange(TokenCache::new(
                ExchangeProvider {
                    credentials,
                    exchanger,
                },
                clock,
            )),
            Credentials::NonExchangeable(credentials) => Inner::Direct(credentials),
        };
        Self { inner }
    }

    /// Returns a valid IAM token.
    pub async fn token(&self) -> Result<Token> {
        match &self.inner {
            Inner::Exchange(cache) => cache.token().await,
            Inner::Direct(credentials) => credentials.iam_token().await,
        }
    }
}

#[derive(Debug)]
struct ExchangeProvider {
    credentials: Arc<dyn ExchangeableCredentials>,
    exchanger: Exchanger,
}

#[async_trait::async_trait]
impl TokenProvider for ExchangeProvider {
    async fn token(&self) -> Result<Token> {
        let request = self
            .credentials
            .iam_token_request(self.exchanger.endpoint())?;
        self.exchanger.exchange(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests::FakeClock;
    use crate::credentials::tests::MockExchangeableCredentials;
    use crate::credentials::{IamTokenRequest, iam_token, service_account};
    use crate::errors::{CredentialsError, UNAUTHENTICATED};
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;
    use std::time::Duration;
    use time::OffsetDateTime;

    type TestResult = anyhow::Result<()>;

    fn start() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn exchanger(server: &Server, clock: &FakeClock) -> Exchanger {
        Exchanger::new()
            .with_endpoint(server.url("/oauth/token").to_string())
            .with_clock(Arc::new(clock.clone()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exchange_is_cached_and_shared() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/oauth/token"))
                .times(1)
                .respond_with(
                    delay_and_then(
                        Duration::from_millis(200),
                        json_encoded(json!({"access_token": "abc", "expires_in": 3600})),
                    ),
                ),
        );
        let clock = FakeClock::new(start());
        let credentials =
            service_account::Builder::new(service_account::tests::test_key()).build()?;
        let source = TokenSource::new(
            credentials,
            exchanger(&server, &clock),
            Arc::new(clock.clone()),
        );

        let tasks = (0..16)
            .map(|_| {
                let source = source.clone();
                tokio::spawn(async move { source.token().await })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            let token = task.await??;
            assert_eq!(token.token, "abc");
        }
        // Served from the cache.
        assert_eq!(source.token().await?.token, "abc");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_refresh_after_expiration() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/oauth/token"))
                .times(2)
                .respond_with(json_encoded(json!({"access_token": "abc", "expires_in": 60}))),
        );
        let clock = FakeClock::new(start());
        let credentials = service_account::Builder::new(service_account::tests::test_key())
            .build()?;
        let source = TokenSource::new(
            credentials,
            exchanger(&server, &clock),
            Arc::new(clock.clone()),
        );
        let token = source.token().await?;
        assert_eq!(
            token.expires_at,
            Some(start() + Duration::from_secs(59))
        );
        clock.advance(Duration::from_secs(58));
        source.token().await?;
        clock.advance(Duration::from_secs(1));
        source.token().await?;
        Ok(())
    }

    #[tokio::test]
    async fn signing_error_skips_exchange() -> TestResult {
        let server = Server::run();
        let clock = FakeClock::new(start());
        let mut mock = MockExchangeableCredentials::new();
        mock.expect_iam_token_request()
            .times(1)
            .returning(|_| Err(CredentialsError::non_retryable_from_msg("cannot sign")));
        let source = TokenSource::new(
            Credentials::from_exchangeable(mock),
            exchanger(&server, &clock),
            Arc::new(clock.clone()),
        );
        let err = source.token().await.unwrap_err();
        assert!(err.to_string().contains("cannot sign"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn exchange_errors_are_not_cached() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/oauth/token"))
                .times(2)
                .respond_with(status_code(503)),
        );
        let clock = FakeClock::new(start());
        let mut mock = MockExchangeableCredentials::new();
        mock.expect_iam_token_request()
            .withf(|audience: &str| audience.ends_with("/oauth/token"))
            .times(2)
            .returning(|_| {
            Ok(IamTokenRequest {
                jwt: "a.b.c".into(),
            })
        });
        let source = TokenSource::new(
            Credentials::from_exchangeable(mock),
            exchanger(&server, &clock),
            Arc::new(clock.clone()),
        );
        assert!(source.token().await.is_err());
        assert!(source.token().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn non_exchangeable() -> TestResult {
        let clock = Arc::new(FakeClock::new(start()));
        let source = TokenSource::new(
            iam_token::Builder::new("static").build(),
            Exchanger::new(),
            clock.clone(),
        );
        assert_eq!(source.token().await?.token, "static");

        let source = TokenSource::new(Credentials::none(), Exchanger::new(), clock);
        let err = source.token().await.unwrap_err();
        assert!(err.to_string().contains(UNAUTHENTICATED), "{err}");
        Ok(())
    }
}
