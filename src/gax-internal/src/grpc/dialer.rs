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

use super::pool::Dialer;
use gax::Result;
use gax::error::Error;
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// The default timeout to establish a connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(20);

/// Creates [tonic] channels.
#[derive(Clone, Debug)]
pub struct ChannelDialer {
    plaintext: bool,
    connect_timeout: Duration,
}

impl Default for ChannelDialer {
    fn default() -> Self {
        Self {
            plaintext: false,
            connect_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

impl ChannelDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables TLS. Only useful for testing.
    pub fn with_plaintext(mut self, v: bool) -> Self {
        self.plaintext = v;
        self
    }

    pub fn with_connect_timeout(mut self, v: Duration) -> Self {
        self.connect_timeout = v;
        self
    }

    pub(crate) fn endpoint(&self, address: &str) -> Result<Endpoint> {
        let scheme = if self.plaintext { "http" } else { "https" };
        let endpoint = Endpoint::from_shared(format!("{scheme}://{address}"))
            .map_err(Error::other)?
            .connect_timeout(self.connect_timeout);
        if self.plaintext {
            return Ok(endpoint);
        }
        endpoint
            .tls_config(ClientTlsConfig::new().with_enabled_roots())
            .map_err(Error::other)
    }
}

#[async_trait::async_trait]
impl Dialer for ChannelDialer {
    type Connection = Channel;

    async fn dial(&self, address: &str) -> Result<Channel> {
        self.endpoint(address)?.connect().await.map_err(Error::io)
    }

    // Channels close when the last clone is dropped.
    async fn close(&self, connection: Channel) -> Result<()> {
        drop(connection);
        Ok(())
    }
}
