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

//! Federated user credentials.
//!
//! Users of a federation (for example, a corporate SAML identity provider)
//! authenticate interactively. These credentials open the federation sign-in
//! page in a browser, and receive the resulting IAM token through a redirect
//! to a loopback HTTP server.
//!
//! The token is cached in memory and, unless disabled, on disk. The browser
//! only opens when there is no valid cached token. Concurrent requests for a
//! token share a single sign-in, which stops (closing the loopback listener)
//! if all of them are dropped.
//!
//! ```no_run
//! # use doublecloud_auth::credentials::federation::Builder;
//! # fn sample() -> anyhow::Result<()> {
//! let credentials = Builder::new("my-federation-id").build()?;
//! # Ok(()) }
//! ```

mod browser;
mod callback;

pub use browser::{Browser, SystemBrowser};

use crate::BuildResult;
use crate::build_errors::Error as BuilderError;
use crate::clock::{self, Clock};
use crate::constants::{FEDERATION_ENDPOINT, FEDERATION_PATH, TOKEN_CACHE_DIR};
use crate::credentials::{Credentials, NonExchangeableCredentials, Result};
use crate::errors::CredentialsError;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use crate::token_file::TokenFile;
use callback::CallbackServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A builder for federated user credentials.
#[derive(Debug)]
pub struct Builder {
    federation_id: String,
    endpoint: String,
    path: String,
    cache_dir: Option<PathBuf>,
    token_cache: bool,
    browser: Arc<dyn Browser>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Builder {
    pub fn new<T: Into<String>>(federation_id: T) -> Self {
        Self {
            federation_id: federation_id.into(),
            endpoint: FEDERATION_ENDPOINT.to_string(),
            path: FEDERATION_PATH.to_string(),
            cache_dir: None,
            token_cache: true,
            browser: Arc::new(SystemBrowser),
            clock: clock::system(),
            cancel: CancellationToken::new(),
        }
    }

    /// Changes the federation endpoint.
    ///
    /// The default is `https://auth.double.cloud`. The console, where the
    /// browser lands after a successful sign-in, is this endpoint with its
    /// path removed.
    pub fn with_endpoint<T: Into<String>>(mut self, v: T) -> Self {
        self.endpoint = v.into();
        self
    }

    /// Changes the path, relative to the endpoint, of the federations.
    pub fn with_path<T: Into<String>>(mut self, v: T) -> Self {
        self.path = v.into();
        self
    }

    /// Changes the directory used to cache tokens between runs.
    ///
    /// The default is `.dcsdk` in the user's home directory.
    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, v: P) -> Self {
        self.cache_dir = Some(v.into());
        self
    }

    /// Neither loads nor saves tokens on disk.
    pub fn without_token_cache(mut self) -> Self {
        self.token_cache = false;
        self
    }

    /// Changes how the sign-in page is opened.
    pub fn with_browser<B: Browser + 'static>(mut self, v: B) -> Self {
        self.browser = Arc::new(v);
        self
    }

    pub fn with_clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.clock = v;
        self
    }

    /// Aborts any sign-in in progress, now or in the future, when `v` is
    /// cancelled.
    pub fn with_cancellation_token(mut self, v: CancellationToken) -> Self {
        self.cancel = v;
        self
    }

    pub fn build(self) -> BuildResult<Credentials> {
        if self.federation_id.is_empty() {
            return Err(BuilderError::missing_field("federation_id"));
        }
        let endpoint = Url::parse(&self.endpoint).map_err(BuilderError::parsing)?;
        let token_file = if self.token_cache {
            self.cache_dir
                .or_else(|| dirs::home_dir().map(|h| h.join(TOKEN_CACHE_DIR)))
                .map(|dir| TokenFile::new(dir, &self.federation_id))
        } else {
            None
        };
        if self.token_cache && token_file.is_none() {
            tracing::warn!("cannot find the home directory, federation tokens will not be cached");
        }
        let initial = token_file.as_ref().and_then(TokenFile::load);
        let provider = FederationTokenProvider {
            federation_id: self.federation_id,
            endpoint,
            path: self.path,
            token_file,
            browser: self.browser,
            cancel: self.cancel,
        };
        Ok(Credentials::NonExchangeable(Arc::new(
            FederationCredentials {
                token_cache: TokenCache::with_token(provider, initial, self.clock),
            },
        )))
    }
}

#[derive(Debug)]
struct FederationCredentials {
    token_cache: TokenCache<FederationTokenProvider>,
}

#[async_trait::async_trait]
impl NonExchangeableCredentials for FederationCredentials {
    async fn iam_token(&self) -> Result<Token> {
        self.token_cache.token().await
    }
}

#[derive(Debug)]
struct FederationTokenProvider {
    federation_id: String,
    endpoint: Url,
    path: String,
    token_file: Option<TokenFile>,
    browser: Arc<dyn Browser>,
    cancel: CancellationToken,
}

impl FederationTokenProvider {
    fn console_url(&self) -> String {
        let mut url = self.endpoint.clone();
        url.set_path("");
        url.set_query(None);
        url.to_string()
    }

    fn federation_url(&self, callback: SocketAddr) -> Result<String> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CredentialsError::non_retryable_from_msg(format!(
                    "the federation endpoint cannot be a base URL: {}",
                    self.endpoint
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(self.path.split('/').filter(|s| !s.is_empty()));
            segments.push(&self.federation_id);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("redirectUrl", &format!("http://{callback}/"));
        Ok(url.to_string())
    }

    async fn sign_in(&self, server: &mut CallbackServer, console_url: &str) -> Result<Token> {
        let url = self.federation_url(server.local_addr())?;
        eprintln!(
            "\nYou are going to be authenticated via federation-id '{}'.\n\
             Your federation authentication web site will be opened.\n\
             After your successful authentication, you will be redirected to '{console_url}'.\n",
            self.federation_id
        );
        self.browser.open(&url).await?;
        tokio::select! {
            token = server.recv() => token,
            _ = self.cancel.cancelled() => Err(CredentialsError::non_retryable_from_msg(
                "the federation sign-in was cancelled",
            )),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for FederationTokenProvider {
    async fn token(&self) -> Result<Token> {
        tracing::info!("starting federation sign-in for {}", self.federation_id);
        let console_url = self.console_url();
        // The listener must be bound before the redirect URL is known.
        let mut server = CallbackServer::start(console_url.clone()).await?;
        let result = self.sign_in(&mut server, &console_url).await;
        server.shutdown().await;
        let token = result?;

        if let Some(file) = &self.token_file {
            if let Err(e) = file.save(&token).await {
                tracing::warn!(
                    "cannot save the federation token to {}: {e}",
                    file.path().display()
                );
            }
        }
        let expires_at = token
            .expires_at
            .map(|t| t.to_string())
            .unwrap_or_else(|| "never".to_string());
        eprintln!("Federation successfully finished, token will expire at {expires_at}");
        tracing::info!("federation sign-in finished for {}", self.federation_id);
        Ok(token)
    }
}
