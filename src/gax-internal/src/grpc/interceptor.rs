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

use auth::token_source::TokenSource;
use gax::Result;
use gax::error::Error;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};

const AUTHORIZATION: &str = "authorization";

/// Adds an IAM token to each request.
///
/// This is the only place where calls request tokens. Caching, and refreshing
/// expired tokens, is the responsibility of the [TokenSource].
#[derive(Clone, Debug)]
pub struct AuthInterceptor {
    tokens: TokenSource,
}

impl AuthInterceptor {
    pub fn new(tokens: TokenSource) -> Self {
        Self { tokens }
    }

    /// Adds the `authorization` header to `request`.
    pub async fn intercept<T>(&self, mut request: tonic::Request<T>) -> Result<tonic::Request<T>> {
        let value = self.authorization().await?;
        request.metadata_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }

    /// Returns the metadata for a new request.
    pub async fn metadata(&self) -> Result<MetadataMap> {
        let mut metadata = MetadataMap::new();
        metadata.insert(AUTHORIZATION, self.authorization().await?);
        Ok(metadata)
    }

    async fn authorization(&self) -> Result<AsciiMetadataValue> {
        let token = self.tokens.token().await.map_err(Error::authentication)?;
        let header = format!("{} {}", token.token_type, token.token);
        let mut value = AsciiMetadataValue::try_from(header).map_err(|e| {
            Error::authentication(auth::errors::CredentialsError::non_retryable(e))
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::clock::SystemClock;
    use auth::credentials::{Credentials, iam_token};
    use auth::exchange::Exchanger;
    use std::sync::Arc;

    fn interceptor(credentials: Credentials) -> AuthInterceptor {
        AuthInterceptor::new(TokenSource::new(
            credentials,
            Exchanger::new(),
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn adds_header() -> anyhow::Result<()> {
        let interceptor = interceptor(iam_token::Builder::new("test-token").build());
        let request = interceptor.intercept(tonic::Request::new(())).await?;
        let value = request
            .metadata()
            .get(AUTHORIZATION)
            .ok_or_else(|| anyhow::anyhow!("missing authorization header"))?;
        assert_eq!(value.to_str()?, "Bearer test-token");
        assert!(value.is_sensitive());

        let metadata = interceptor.metadata().await?;
        assert_eq!(
            metadata.get(AUTHORIZATION).map(|v| v.to_str()).transpose()?,
            Some("Bearer test-token")
        );
        Ok(())
    }

    #[tokio::test]
    async fn no_credentials() {
        let interceptor = interceptor(Credentials::none());
        let err = interceptor
            .intercept(tonic::Request::new(()))
            .await
            .unwrap_err();
        assert!(err.is_authentication(), "{err:?}");
        assert!(
            err.to_string().contains(auth::errors::UNAUTHENTICATED),
            "{err}"
        );
    }

    #[tokio::test]
    async fn invalid_token() {
        let interceptor = interceptor(iam_token::Builder::new("bad\ntoken").build());
        let err = interceptor.metadata().await.unwrap_err();
        assert!(err.is_authentication(), "{err:?}");
    }
}
