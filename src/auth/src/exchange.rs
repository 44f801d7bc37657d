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

//! Exchanges signed assertions for IAM tokens.
//!
//! [Exchangeable credentials] produce a signed JWT assertion. The assertion
//! is sent to the DoubleCloud authorization server, using the [JWT bearer]
//! grant type, and the server returns an IAM token.
//!
//! [Exchangeable credentials]: crate::credentials::ExchangeableCredentials
//! [JWT bearer]: https://datatracker.ietf.org/doc/html/rfc7523

use crate::clock::{self, Clock};
use crate::constants::{JWT_BEARER_GRANT_TYPE, OAUTH2_TOKEN_SERVER_URL, USER_AGENT};
use crate::credentials::{IamTokenRequest, Result};
use crate::errors::{self, CredentialsError};
use crate::token::Token;
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;

/// Sends [IamTokenRequest]s to the authorization server.
#[derive(Clone, Debug)]
pub struct Exchanger {
    client: reqwest::Client,
    endpoint: String,
    clock: Arc<dyn Clock>,
}

impl Default for Exchanger {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchanger {
    /// Creates an exchanger for the default authorization server.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: OAUTH2_TOKEN_SERVER_URL.to_string(),
            clock: clock::system(),
        }
    }

    /// Changes the URL of the authorization server.
    pub fn with_endpoint<T: Into<String>>(mut self, v: T) -> Self {
        self.endpoint = v.into();
        self
    }

    /// Changes the clock used to compute the token expiration time.
    pub fn with_clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.clock = v;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchanges `request` for an IAM token.
    ///
    /// The token expires one second before the time reported by the server,
    /// rounded down to whole seconds.
    pub async fn exchange(&self, request: &IamTokenRequest) -> Result<Token> {
        tracing::debug!("requesting IAM token from {}", self.endpoint);
        let params = [
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", request.jwt.as_str()),
        ];
        let response = self
            .client
            .post(&self.endpoint)
            .header(http::header::USER_AGENT, USER_AGENT)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                CredentialsError::from_msg(true, format!("failed to request token: {e}"))
            })?;

        let status = response.status();
        if status == http::StatusCode::NOT_FOUND {
            tracing::error!("IAM token request failed with {status}");
            return Err(CredentialsError::non_retryable_from_msg(format!(
                "{status}.\nIs this IAM running using Service Account? \
                 That is, Instance.service_account_id should not be empty."
            )));
        }
        if status != http::StatusCode::OK {
            tracing::error!("IAM token request failed with {status}");
            return Err(status_error(status, response.text().await));
        }

        let response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialsError::new(false, e))?;
        let token = response.into_token(self.clock.now())?;
        tracing::debug!("IAM token expires at {:?}", token.expires_at);
        Ok(token)
    }
}

fn status_error<E: std::fmt::Display>(
    status: http::StatusCode,
    body: std::result::Result<String, E>,
) -> CredentialsError {
    let message = match body {
        Ok(body) => format!("error requesting token, failed with status {status}: {body}"),
        Err(e) => format!(
            "error requesting token, failed with status {status}, \
             cannot read the response body: {e}"
        ),
    };
    CredentialsError::from_msg(errors::is_retryable(status), message)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: OffsetDateTime) -> Result<Token> {
        if self.access_token.is_empty() {
            return Err(CredentialsError::non_retryable_from_msg(
                "the token response has an empty access_token",
            ));
        }
        let expires_in = i64::try_from(self.expires_in).map_err(CredentialsError::non_retryable)?;
        let expires_at = now
            .unix_timestamp()
            .checked_add(expires_in - 1)
            .ok_or_else(|| {
                CredentialsError::non_retryable_from_msg(format!(
                    "expires_in is out of range: {expires_in}"
                ))
            })
            .and_then(|t| {
                OffsetDateTime::from_unix_timestamp(t).map_err(CredentialsError::non_retryable)
            })?;
        let mut token = Token::bearer(self.access_token, Some(expires_at));
        if let Some(t) = self.token_type.filter(|t| !t.is_empty()) {
            token.token_type = t;
        }
        Ok(token)
    }
}
