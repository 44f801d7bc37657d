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

//! DoubleCloud SDK for Rust.
//!
//! The [Sdk] type authenticates and routes RPCs to the DoubleCloud services.
//! It owns a pool of gRPC connections, created on first use, and a token
//! source that attaches an IAM token to every request.
//!
//! Many RPCs start long-running operations. Use [Sdk::wrap_operation] to
//! track them until they complete.
//!
//! # Example
//! ```no_run
//! # use doublecloud_sdk::Sdk;
//! use auth::credentials::service_account;
//! use auth::credentials::service_account::ServiceAccountKey;
//! # async fn sample() -> anyhow::Result<()> {
//! let key = ServiceAccountKey::from_json_file("authorized_key.json")?;
//! let sdk = Sdk::builder()
//!     .with_credentials(service_account::Builder::new(key).build()?)
//!     .build()?;
//! let token = sdk.create_iam_token().await?;
//! println!("token expires at {:?}", token.expires_at);
//! sdk.shutdown().await?;
//! # Ok(()) }
//! ```

pub mod builder;
pub mod endpoints;
pub mod model;
pub mod operations;

pub use gax::Result;
pub use gax::error::Error;
pub use lro::{Operation, OperationDescriptor, OperationStatus};

use auth::credentials::Credentials;
use auth::errors::CredentialsError;
use auth::exchange::Exchanger;
use auth::token::Token;
use auth::token_source::TokenSource;
use endpoints::{ApiEndpoint, Endpoints, ServiceId};
use gax::polling_backoff_policy::PollingBackoffPolicy;
use gaxi::grpc::{AuthInterceptor, ChannelDialer};
use operations::{OperationKind, OperationServiceClient, UnknownOperation};
use std::sync::Arc;

/// The entry point to the DoubleCloud services.
///
/// Cloning an `Sdk` is cheap, all the clones share the same connections and
/// token cache.
#[derive(Clone, Debug)]
pub struct Sdk {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    credentials: Credentials,
    exchanger: Exchanger,
    client: gaxi::grpc::Client,
    endpoints: Endpoints,
    polling_policy: Arc<dyn PollingBackoffPolicy>,
}

impl Sdk {
    /// Returns a builder to configure a new SDK instance.
    pub fn builder() -> builder::Builder {
        builder::Builder::new()
    }

    pub(crate) fn new(credentials: Credentials, config: builder::Config) -> Self {
        let mut exchanger = Exchanger::new().with_clock(config.clock.clone());
        if let Some(endpoint) = config.auth_endpoint {
            exchanger = exchanger.with_endpoint(endpoint);
        }
        let tokens = TokenSource::new(credentials.clone(), exchanger.clone(), config.clock);
        let dialer = ChannelDialer::new()
            .with_plaintext(config.plaintext)
            .with_connect_timeout(config.dial_timeout);
        let client = gaxi::grpc::Client::new(dialer, AuthInterceptor::new(tokens));
        Self {
            inner: Arc::new(Inner {
                credentials,
                exchanger,
                client,
                endpoints: Endpoints::new(config.endpoint, config.override_endpoint),
                polling_policy: config.polling_policy,
            }),
        }
    }

    /// The base endpoint used to derive the service addresses.
    pub fn api_endpoint(&self) -> &str {
        self.inner.endpoints.base()
    }

    /// The names of the services known to the SDK, sorted.
    pub fn known_services(&self) -> Vec<String> {
        self.inner.endpoints.known_services()
    }

    /// The endpoint for `service`, if it is known.
    pub fn endpoint(&self, service: &ServiceId) -> Option<ApiEndpoint> {
        self.inner.endpoints.get(service).cloned()
    }

    /// Connects to `service`, reporting any errors.
    ///
    /// The connection is kept in the pool and reused by later calls.
    pub async fn check_endpoint_connection(&self, service: &ServiceId) -> Result<()> {
        let address = self.address(service)?;
        self.inner.client.connection(&address).await.map(|_| ())
    }

    /// Creates a new IAM token using the configured credentials.
    ///
    /// The token is not cached. Service account credentials always result in
    /// a new exchange.
    pub async fn create_iam_token(&self) -> Result<Token> {
        self.iam_token().await.map_err(Error::authentication)
    }

    async fn iam_token(&self) -> auth::credentials::Result<Token> {
        match &self.inner.credentials {
            Credentials::Exchangeable(c) => {
                let request = c.iam_token_request(self.inner.exchanger.endpoint())?;
                self.inner.exchanger.exchange(&request).await
            }
            Credentials::NonExchangeable(c) => c.iam_token().await,
            _ => Err(CredentialsError::non_retryable_from_msg(
                "unsupported credentials type",
            )),
        }
    }

    /// Sends a unary RPC to `service`.
    ///
    /// The request carries the IAM token for the configured credentials. The
    /// connection is established on first use.
    pub async fn execute<Request, Response>(
        &self,
        service: &ServiceId,
        path: http::uri::PathAndQuery,
        request: Request,
    ) -> Result<Response>
    where
        Request: prost::Message + 'static,
        Response: prost::Message + Default + 'static,
    {
        let address = self.address(service)?;
        self.inner.client.execute(&address, path, request).await
    }

    /// Returns a client for the operations of one service.
    pub fn operations(&self, kind: OperationKind) -> OperationServiceClient {
        OperationServiceClient::new(self.clone(), kind)
    }

    /// Tracks an operation returned by a service.
    ///
    /// The operation is polled through the service that owns it, as
    /// determined by the operation id.
    ///
    /// # Example
    /// ```
    /// # use doublecloud_sdk::{Operation, Result, Sdk};
    /// # use doublecloud_sdk::model;
    /// async fn sample(sdk: &Sdk, started: Result<model::Operation>) -> Result<()> {
    ///     let mut op = started.and_then(|o| sdk.wrap_operation(o))?;
    ///     op.wait().await?;
    ///     if let Some(e) = op.error() {
    ///         println!("operation {} failed: {e}", op.id());
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn wrap_operation<T: Into<OperationDescriptor>>(&self, operation: T) -> Result<Operation> {
        let descriptor = operation.into();
        let Some(kind) = OperationKind::from_operation_id(&descriptor.id) else {
            return Err(Error::other(UnknownOperation::new(descriptor.id)));
        };
        tracing::debug!("tracking operation {} with {kind:?}", descriptor.id);
        let client: Arc<dyn lro::OperationClient> = Arc::new(self.operations(kind));
        let policy = self.inner.polling_policy.clone();
        Ok(Operation::new(client, descriptor).with_polling_policy(policy))
    }

    /// Closes all connections.
    ///
    /// Any RPCs started after this call fail. Calling `shutdown()` more than
    /// once returns the result of the first call.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down the DoubleCloud SDK");
        self.inner.client.shutdown().await
    }

    fn address(&self, service: &ServiceId) -> Result<String> {
        self.inner
            .endpoints
            .resolve(service)
            .map(|e| e.address.clone())
            .map_err(Error::other)
    }
}
