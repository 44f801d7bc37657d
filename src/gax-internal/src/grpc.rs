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

//! Implements the common features of all gRPC-based clients.
//!
//! Every call goes through the same steps: obtain a token from the
//! [AuthInterceptor], obtain a connection from the [ConnectionPool], and then
//! send the request. Calls without a valid token never dial.

mod dialer;
mod from_status;
mod interceptor;
pub mod pool;

pub use dialer::{ChannelDialer, DEFAULT_DIAL_TIMEOUT};
pub use from_status::to_gax_error;
pub use interceptor::AuthInterceptor;
pub use pool::{CloseErrors, ConnectionPool, Dialer};

use gax::Result;
use gax::error::Error;
use tonic::transport::Channel;

#[doc(hidden)]
pub type InnerClient = tonic::client::Grpc<Channel>;

/// An authenticated gRPC client for any number of addresses.
///
/// Cloning a `Client` shares the connections and the token cache.
#[derive(Debug)]
pub struct Client<D = ChannelDialer>
where
    D: Dialer<Connection = Channel>,
{
    pool: ConnectionPool<D>,
    interceptor: AuthInterceptor,
}

impl<D> Clone for Client<D>
where
    D: Dialer<Connection = Channel>,
{
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<D> Client<D>
where
    D: Dialer<Connection = Channel>,
{
    pub fn new(dialer: D, interceptor: AuthInterceptor) -> Self {
        Self {
            pool: ConnectionPool::new(dialer),
            interceptor,
        }
    }

    /// Sends a unary request to `address`.
    pub async fn execute<Request, Response>(
        &self,
        address: &str,
        path: http::uri::PathAndQuery,
        request: Request,
    ) -> Result<Response>
    where
        Request: prost::Message + 'static,
        Response: prost::Message + Default + 'static,
    {
        let (mut inner, request) = self.prepare(address, request).await?;
        let codec = tonic_prost::ProstCodec::default();
        let response: tonic::Response<Response> = inner
            .unary(request, path, codec)
            .await
            .map_err(|s| to_gax_error(address, s))?;
        Ok(response.into_inner())
    }

    /// Sends a server-streaming request to `address`.
    pub async fn server_streaming<Request, Response>(
        &self,
        address: &str,
        path: http::uri::PathAndQuery,
        request: Request,
    ) -> Result<tonic::Streaming<Response>>
    where
        Request: prost::Message + 'static,
        Response: prost::Message + Default + 'static,
    {
        let (mut inner, request) = self.prepare(address, request).await?;
        let codec = tonic_prost::ProstCodec::default();
        let response = inner
            .server_streaming(request, path, codec)
            .await
            .map_err(|s| to_gax_error(address, s))?;
        Ok(response.into_inner())
    }

    /// Returns the connection to `address`, dialing it if needed.
    pub async fn connection(&self, address: &str) -> Result<Channel> {
        self.pool.connection(address).await
    }

    /// Closes all the connections. New calls fail.
    pub async fn shutdown(&self) -> Result<()> {
        self.pool.shutdown().await
    }

    // The token comes first: calls that cannot authenticate never dial.
    async fn prepare<Request>(
        &self,
        address: &str,
        request: Request,
    ) -> Result<(InnerClient, tonic::Request<Request>)> {
        let request = self.interceptor.intercept(tonic::Request::new(request)).await?;
        let channel = self.pool.connection(address).await?;
        let mut inner = tonic::client::Grpc::new(channel);
        inner
            .ready()
            .await
            .map_err(|e| Error::connect(address, e))?;
        Ok((inner, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::clock::SystemClock;
    use auth::credentials::{Credentials, iam_token};
    use auth::exchange::Exchanger;
    use auth::token_source::TokenSource;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingDialer {
        dials: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Dialer for Arc<CountingDialer> {
        type Connection = Channel;

        async fn dial(&self, address: &str) -> Result<Channel> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            ChannelDialer::new()
                .with_plaintext(true)
                .with_connect_timeout(std::time::Duration::from_secs(5))
                .dial(address)
                .await
        }

        async fn close(&self, _connection: Channel) -> Result<()> {
            Ok(())
        }
    }

    fn client(credentials: Credentials) -> (Arc<CountingDialer>, Client<Arc<CountingDialer>>) {
        let dialer = Arc::new(CountingDialer::default());
        let tokens = TokenSource::new(credentials, Exchanger::new(), Arc::new(SystemClock));
        let client = Client::new(dialer.clone(), AuthInterceptor::new(tokens));
        (dialer, client)
    }

    fn path() -> http::uri::PathAndQuery {
        http::uri::PathAndQuery::from_static("/test.Service/Get")
    }

    #[tokio::test]
    async fn no_credentials_never_dials() {
        let (dialer, client) = client(Credentials::none());
        let err = client
            .execute::<(), ()>("127.0.0.1:1", path(), ())
            .await
            .unwrap_err();
        assert!(err.is_authentication(), "{err:?}");
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dial_errors() {
        let (dialer, client) = client(iam_token::Builder::new("test-token").build());
        for _ in 0..2 {
            let err = client
                .execute::<(), ()>("127.0.0.1:1", path(), ())
                .await
                .unwrap_err();
            assert!(err.is_connect(), "{err:?}");
            assert_eq!(err.address(), Some("127.0.0.1:1"));
        }
        // Failed dials are not cached.
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closed_after_shutdown() -> anyhow::Result<()> {
        let (dialer, client) = client(iam_token::Builder::new("test-token").build());
        client.shutdown().await?;
        client.shutdown().await?;
        let err = client.connection("127.0.0.1:1").await.unwrap_err();
        assert!(err.is_closed(), "{err:?}");
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 0);
        Ok(())
    }
}
