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

//! The loopback server that receives the federation callback.
//!
//! Once the user signs in, the federation endpoint redirects the browser to
//! `http://{local_addr}/?token=...&expiresAt=...`. The server captures the
//! first request and redirects the browser to the console.

use crate::credentials::Result;
use crate::errors::CredentialsError;
use crate::token::Token;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::response::Redirect;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

const MISSING_TOKEN: &str = "failed to fetch token from http request";
const MISSING_EXPIRATION: &str = "failed to fetch token expiration timestamp from http request";

type Sender = oneshot::Sender<Result<Token>>;

#[derive(Clone)]
struct CallbackState {
    // Only the first request reports a result.
    sender: Arc<Mutex<Option<Sender>>>,
    console_url: Arc<str>,
}

/// A running callback server.
///
/// The server stops when [CallbackServer::shutdown] is called, or when this
/// value is dropped.
pub(crate) struct CallbackServer {
    local_addr: SocketAddr,
    result: oneshot::Receiver<Result<Token>>,
    stop: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
    _guard: DropGuard,
}

impl CallbackServer {
    /// Binds a loopback listener and starts serving requests.
    ///
    /// Prefers IPv4, falling back to IPv6 on hosts without an IPv4 loopback
    /// interface.
    pub async fn start(console_url: String) -> Result<Self> {
        let listener = match TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await
        {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!("cannot listen on IPv4 loopback, trying IPv6: {e}");
                TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, 0)))
                    .await
                    .map_err(|e| {
                        CredentialsError::from_msg(
                            false,
                            format!("failed to start the federation callback listener: {e}"),
                        )
                    })?
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(CredentialsError::non_retryable)?;

        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            sender: Arc::new(Mutex::new(Some(tx))),
            console_url: console_url.into(),
        };
        // Any path is accepted, the redirect URL uses `/`.
        let app = Router::new().fallback(callback).with_state(state);

        let stop = CancellationToken::new();
        let signal = stop.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });
        tracing::debug!("federation callback listening on {local_addr}");
        Ok(Self {
            local_addr,
            result: rx,
            _guard: stop.clone().drop_guard(),
            stop,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the first callback.
    pub async fn recv(&mut self) -> Result<Token> {
        match (&mut self.result).await {
            Ok(r) => r,
            Err(_) => Err(CredentialsError::non_retryable_from_msg(
                "the federation callback server stopped before receiving a token",
            )),
        }
    }

    /// Stops the server and waits for it to finish.
    pub async fn shutdown(self) {
        self.stop.cancel();
        match self.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("federation callback server error: {e}"),
            Err(e) => tracing::warn!("federation callback server task failed: {e}"),
        }
    }
}

async fn callback(State(state): State<CallbackState>, RawQuery(query): RawQuery) -> Redirect {
    let result = parse_query(query.as_deref().unwrap_or_default());
    let sender = state
        .sender
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match sender {
        // The receiver may be gone if the flow was cancelled.
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => tracing::debug!("ignoring repeated federation callback"),
    }
    Redirect::to(&state.console_url)
}

fn parse_query(query: &str) -> Result<Token> {
    let mut tokens = Vec::new();
    let mut expirations = Vec::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        match k.as_ref() {
            "token" => tokens.push(v.into_owned()),
            "expiresAt" => expirations.push(v.into_owned()),
            _ => {}
        }
    }
    let token = match tokens.as_slice() {
        [t] if !t.is_empty() => t.clone(),
        _ => return Err(CredentialsError::non_retryable_from_msg(MISSING_TOKEN)),
    };
    let expires_at = match expirations.as_slice() {
        [e] => e,
        _ => return Err(CredentialsError::non_retryable_from_msg(MISSING_EXPIRATION)),
    };
    let expires_at = OffsetDateTime::parse(expires_at, &Rfc3339).map_err(|e| {
        CredentialsError::non_retryable_from_msg(format!(
            "failed to parse token expiration timestamp from: {expires_at}, {e}"
        ))
    })?;
    Ok(Token::bearer(token, Some(expires_at)))
}
