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

//! Service account credentials.
//!
//! A service account is an account for an application or compute workload,
//! instead of an individual end user. Applications running outside DoubleCloud
//! authenticate as a service account using one of its keys.
//!
//! These credentials sign a short-lived JWT assertion with the key, the
//! assertion is then exchanged for an IAM token (see [crate::exchange]). The
//! assertion uses the `PS256` algorithm: RSA-PSS with SHA-256, and a salt as
//! long as the hash. Its audience is the URL of the exchange endpoint.
//!
//! ```no_run
//! # use doublecloud_auth::credentials::service_account::{Builder, ServiceAccountKey};
//! # fn sample() -> anyhow::Result<()> {
//! let key = ServiceAccountKey::from_json_file("authorized_key.json")?;
//! let credentials = Builder::new(key).build()?;
//! # Ok(()) }
//! ```

mod jws;
mod key;

pub use key::ServiceAccountKey;

use crate::BuildResult;
use crate::build_errors::Error as BuilderError;
use crate::clock::{self, Clock};
use crate::constants::DEFAULT_ASSERTION_TIMEOUT;
use crate::credentials::{Credentials, ExchangeableCredentials, IamTokenRequest, Result};
use crate::errors::CredentialsError;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use jws::{JwsClaims, JwsHeader};
use rustls::crypto::{CryptoProvider, KeyProvider};
use rustls::sign::Signer;
use rustls_pki_types::PrivateKeyDer;
use rustls_pki_types::pem::PemObject;
use std::sync::Arc;

const ALGORITHM: &str = "PS256";

/// A builder for service account credentials.
#[derive(Debug)]
pub struct Builder {
    key: ServiceAccountKey,
    clock: Arc<dyn Clock>,
}

impl Builder {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            clock: clock::system(),
        }
    }

    /// Sets the clock used to compute the `iat` and `exp` claims.
    pub fn with_clock(mut self, v: Arc<dyn Clock>) -> Self {
        self.clock = v;
        self
    }

    /// Validates the key and returns a [Credentials] instance.
    ///
    /// Fails if the key has no id, if it was not issued to a service account,
    /// or if the private key is not a valid RSA key.
    pub fn build(self) -> BuildResult<Credentials> {
        let service_account_id = self.key.validate()?.to_string();
        let signer = signer(&self.key.private_key)?;
        Ok(Credentials::Exchangeable(Arc::new(ServiceAccountSigner {
            key_id: self.key.id,
            service_account_id,
            signer,
            clock: self.clock,
        })))
    }
}

#[derive(Debug)]
struct ServiceAccountSigner {
    key_id: String,
    service_account_id: String,
    signer: Box<dyn Signer>,
    clock: Arc<dyn Clock>,
}

impl ExchangeableCredentials for ServiceAccountSigner {
    fn iam_token_request(&self, audience: &str) -> Result<IamTokenRequest> {
        let now = self.clock.now();
        let claims = JwsClaims {
            iss: self.service_account_id.clone(),
            sub: self.service_account_id.clone(),
            aud: audience.to_string(),
            iat: now,
            exp: now + DEFAULT_ASSERTION_TIMEOUT,
        };
        let header = JwsHeader {
            alg: ALGORITHM,
            typ: "JWT",
            kid: &self.key_id,
        };
        let encoded_header_claims = format!("{}.{}", header.encode()?, claims.encode()?);
        let sig = self
            .signer
            .sign(encoded_header_claims.as_bytes())
            .map_err(CredentialsError::non_retryable)?;
        let jwt = format!(
            "{}.{}",
            encoded_header_claims,
            &BASE64_URL_SAFE_NO_PAD.encode(sig)
        );
        Ok(IamTokenRequest { jwt })
    }
}

// Creates a RSA-PSS signer from a PEM-encoded private key.
fn signer(private_key: &str) -> BuildResult<Box<dyn Signer>> {
    let key_provider = key_provider()?;
    let der = PrivateKeyDer::from_pem_slice(private_key.as_bytes()).map_err(|e| {
        BuilderError::invalid_key(format!("cannot parse the private key as PEM: {e}"))
    })?;
    let der = match der {
        d @ (PrivateKeyDer::Pkcs8(_) | PrivateKeyDer::Pkcs1(_)) => d,
        _ => {
            return Err(BuilderError::invalid_key(
                "expected a RSA private key in PKCS#8 or PKCS#1 format",
            ));
        }
    };
    let sk = key_provider
        .load_private_key(der)
        .map_err(BuilderError::invalid_key)?;
    sk.choose_scheme(&[rustls::SignatureScheme::RSA_PSS_SHA256])
        .ok_or_else(|| {
            BuilderError::invalid_key("the private key does not support RSA_PSS_SHA256 signatures")
        })
}

fn key_provider() -> BuildResult<&'static dyn KeyProvider> {
    if let Some(p) = CryptoProvider::get_default() {
        return Ok(p.key_provider);
    }
    #[cfg(feature = "default-rustls-provider")]
    {
        Ok(rustls::crypto::aws_lc_rs::default_provider().key_provider)
    }
    #[cfg(not(feature = "default-rustls-provider"))]
    {
        Err(BuilderError::invalid_key(
            "no rustls crypto provider installed, call `rustls::CryptoProvider::install_default()`",
        ))
    }
}
