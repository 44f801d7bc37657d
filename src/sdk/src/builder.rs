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

//! Configure and create [Sdk] instances.
//!
//! [Sdk]: crate::Sdk

use auth::clock::{Clock, SystemClock};
use auth::credentials::Credentials;
use gax::polling_backoff_policy::{FixedInterval, PollingBackoffPolicy, PollingBackoffPolicyArg};
use std::sync::Arc;
use std::time::Duration;

/// The default DoubleCloud API endpoint.
pub const DEFAULT_ENDPOINT: &str = "api.double.cloud:443";

pub type Result<T> = std::result::Result<T, Error>;

/// Indicates a problem with the SDK configuration.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// No credentials were configured.
    pub fn is_missing_credentials(&self) -> bool {
        matches!(self.0, ErrorKind::MissingCredentials)
    }

    /// The credentials are of a type this version of the SDK cannot use.
    pub fn is_unsupported_credentials(&self) -> bool {
        matches!(self.0, ErrorKind::UnsupportedCredentials)
    }

    pub(crate) fn unsupported_credentials() -> Self {
        Self(ErrorKind::UnsupportedCredentials)
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("credentials required")]
    MissingCredentials,
    #[error("unsupported credentials type")]
    UnsupportedCredentials,
}

/// A builder for [Sdk].
///
/// # Example
/// ```no_run
/// # use doublecloud_sdk::Sdk;
/// use auth::credentials::iam_token;
/// # fn sample() -> anyhow::Result<()> {
/// let sdk = Sdk::builder()
///     .with_credentials(iam_token::Builder::new("my-iam-token").build())
///     .build()?;
/// # Ok(()) }
/// ```
///
/// [Sdk]: crate::Sdk
#[derive(Clone, Debug)]
pub struct Builder {
    config: Config,
}

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub credentials: Option<Credentials>,
    pub endpoint: String,
    pub override_endpoint: bool,
    pub plaintext: bool,
    pub auth_endpoint: Option<String>,
    pub dial_timeout: Duration,
    pub polling_policy: Arc<dyn PollingBackoffPolicy>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            config: Config {
                credentials: None,
                endpoint: DEFAULT_ENDPOINT.to_string(),
                override_endpoint: false,
                plaintext: false,
                auth_endpoint: None,
                dial_timeout: gaxi::grpc::DEFAULT_DIAL_TIMEOUT,
                polling_policy: Arc::new(FixedInterval::default()),
                clock: Arc::new(SystemClock),
            },
        }
    }

    /// Creates the SDK.
    ///
    /// This function performs no I/O. Connections are established on first
    /// use, and tokens are fetched before the first RPC.
    pub fn build(self) -> Result<crate::Sdk> {
        let mut config = self.config;
        let credentials = config
            .credentials
            .take()
            .ok_or(Error(ErrorKind::MissingCredentials))?;
        match &credentials {
            Credentials::Exchangeable(_) | Credentials::NonExchangeable(_) => {}
            _ => return Err(Error::unsupported_credentials()),
        }
        Ok(crate::Sdk::new(credentials, config))
    }

    /// Sets the credentials used to authenticate every RPC. Required.
    pub fn with_credentials<T: Into<Credentials>>(mut self, v: T) -> Self {
        self.config.credentials = Some(v.into());
        self
    }

    /// Changes the base endpoint, defaults to [DEFAULT_ENDPOINT].
    ///
    /// Each service lives at `{service}.{endpoint}`, unless
    /// [with_override_endpoint][Self::with_override_endpoint] is set.
    pub fn with_endpoint<T: Into<String>>(mut self, v: T) -> Self {
        self.config.endpoint = v.into();
        self
    }

    /// Use the endpoint, as-is, for all services.
    pub fn with_override_endpoint(mut self, v: bool) -> Self {
        self.config.override_endpoint = v;
        self
    }

    /// Disables TLS. Only useful in tests.
    pub fn with_plaintext(mut self, v: bool) -> Self {
        self.config.plaintext = v;
        self
    }

    /// Changes the URL used to exchange signed assertions for IAM tokens.
    pub fn with_auth_endpoint<T: Into<String>>(mut self, v: T) -> Self {
        self.config.auth_endpoint = Some(v.into());
        self
    }

    pub fn with_dial_timeout(mut self, v: Duration) -> Self {
        self.config.dial_timeout = v;
        self
    }

    /// Changes the interval between operation polls, defaults to one second.
    pub fn with_polling_interval(self, v: Duration) -> Self {
        self.with_polling_backoff_policy(v)
    }

    pub fn with_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.config.polling_policy = v.into().into_inner();
        self
    }

    /// Changes the clock used to compute token expiration times.
    pub fn with_clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.config.clock = v;
        self
    }
}
