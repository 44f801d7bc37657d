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

//! A lazy pool of connections, keyed by address.
//!
//! Connections are dialed on first use. Concurrent requests for the same
//! address share a single dial, and its result. Failed dials are not cached,
//! the next request dials again.
//!
//! [ConnectionPool::shutdown] closes every connection, at most once. After
//! shutdown starts, the pool rejects new requests, in-flight dials are
//! cancelled, and any dial that completes anyway is closed instead of stored.

use gax::Result;
use gax::error::Error;
use gax::single_flight::Group;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Opens and closes connections.
#[async_trait::async_trait]
pub trait Dialer: std::fmt::Debug + Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    async fn dial(&self, address: &str) -> Result<Self::Connection>;

    async fn close(&self, connection: Self::Connection) -> Result<()>;
}

/// The connections in a pool.
///
/// Cloning a `ConnectionPool` returns a handle to the same connections.
pub struct ConnectionPool<D: Dialer> {
    inner: Arc<Inner<D>>,
}

struct Inner<D: Dialer> {
    dialer: D,
    state: Mutex<State<D::Connection>>,
    dials: Group<String, Result<D::Connection>>,
    shutdown: Group<(), Result<()>>,
    cancel: CancellationToken,
}

struct State<C> {
    connections: HashMap<String, C>,
    closing: bool,
    // Set once the shutdown completes.
    closed: Option<Result<()>>,
}

impl<C> State<C> {
    fn is_shut_down(&self) -> bool {
        self.closing || self.closed.is_some()
    }
}

impl<D: Dialer> Clone for ConnectionPool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Dialer> std::fmt::Debug for ConnectionPool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        let mut addresses = state.connections.keys().collect::<Vec<_>>();
        addresses.sort();
        f.debug_struct("ConnectionPool")
            .field("dialer", &self.inner.dialer)
            .field("addresses", &addresses)
            .field("closing", &state.closing)
            .field("closed", &state.closed.is_some())
            .finish()
    }
}

impl<D: Dialer> ConnectionPool<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            inner: Arc::new(Inner {
                dialer,
                state: Mutex::new(State {
                    connections: HashMap::new(),
                    closing: false,
                    closed: None,
                }),
                dials: Group::new(),
                shutdown: Group::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Returns the connection for `address`, dialing it if needed.
    pub async fn connection(&self, address: &str) -> Result<D::Connection> {
        {
            let state = self.inner.lock();
            if state.is_shut_down() {
                return Err(Error::closed());
            }
            if let Some(c) = state.connections.get(address) {
                return Ok(c.clone());
            }
        }
        let inner = self.inner.clone();
        let address = address.to_string();
        self.inner
            .dials
            .run(address.clone(), move || inner.dial(address))
            .await
    }

    /// Closes all the connections.
    ///
    /// Concurrent and later calls return the result of the first call. The
    /// error, if any, includes every connection that failed to close.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(result) = &self.inner.lock().closed {
            return result.clone();
        }
        let inner = self.inner.clone();
        self.inner
            .shutdown
            .run((), move || inner.close_all())
            .await
    }
}

impl<D: Dialer> Inner<D> {
    fn lock(&self) -> std::sync::MutexGuard<'_, State<D::Connection>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn dial(self: Arc<Self>, address: String) -> Result<D::Connection> {
        {
            // The previous dial may have completed while this one was queued.
            let state = self.lock();
            if state.is_shut_down() {
                return Err(Error::closed());
            }
            if let Some(c) = state.connections.get(&address) {
                return Ok(c.clone());
            }
        }

        tracing::debug!("dialing {address}");
        let connection = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(Error::cancelled("the connection pool is shutting down"));
            }
            r = self.dialer.dial(&address) => r.map_err(|e| Error::connect(&address, e))?,
        };

        self.store(&address, connection).await
    }

    // Saves a new connection, unless the pool started shutting down while it
    // was dialed.
    async fn store(&self, address: &str, connection: D::Connection) -> Result<D::Connection> {
        let rejected = {
            let mut state = self.lock();
            if state.is_shut_down() {
                Some(connection.clone())
            } else {
                state
                    .connections
                    .insert(address.to_string(), connection.clone());
                None
            }
        };
        if let Some(c) = rejected {
            tracing::debug!("closing connection to {address}, the pool is shutting down");
            if let Err(e) = self.dialer.close(c).await {
                tracing::warn!("error closing connection to {address}: {e}");
            }
            return Err(Error::closed());
        }
        tracing::debug!("connected to {address}");
        Ok(connection)
    }

    async fn close_all(self: Arc<Self>) -> Result<()> {
        let connections = {
            let mut state = self.lock();
            if let Some(result) = &state.closed {
                return result.clone();
            }
            state.closing = true;
            std::mem::take(&mut state.connections)
        };
        self.cancel.cancel();

        tracing::info!("closing {} connection(s)", connections.len());
        let closing = connections.into_iter().map(|(address, c)| {
            let dialer = &self.dialer;
            async move { (address, dialer.close(c).await) }
        });
        let mut errors = futures::future::join_all(closing)
            .await
            .into_iter()
            .filter_map(|(address, r)| r.err().map(|e| (address, e)))
            .collect::<Vec<_>>();
        errors.sort_by(|a, b| a.0.cmp(&b.0));

        let result = if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::other(CloseErrors(errors)))
        };
        self.lock().closed = Some(result.clone());
        result
    }
}

/// The connections that failed to close during shutdown.
#[derive(Debug, thiserror::Error)]
pub struct CloseErrors(Vec<(String, Error)>);

impl CloseErrors {
    /// The address and error for each connection, sorted by address.
    pub fn errors(&self) -> &[(String, Error)] {
        &self.0
    }
}

impl std::fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to close {} connection(s)", self.0.len())?;
        for (address, e) in &self.0 {
            write!(f, "; {address}: {e}")?;
        }
        Ok(())
    }
}
