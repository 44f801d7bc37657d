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

use crate::credentials::Result;
use crate::errors::CredentialsError;
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The claims of the assertion exchanged for an IAM token.
#[derive(Serialize)]
pub struct JwsClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    #[serde(with = "time::serde::timestamp")]
    pub iat: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub exp: OffsetDateTime,
}

impl JwsClaims {
    pub fn encode(&self) -> Result<String> {
        if self.exp < self.iat {
            return Err(CredentialsError::non_retryable_from_msg(format!(
                "expiration time {:?}, must be later than issued time {:?}",
                self.exp, self.iat
            )));
        }
        let json = serde_json::to_string(&self).map_err(CredentialsError::non_retryable)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }
}

/// The header that describes who, what, and how a token was created.
#[derive(Serialize, Deserialize, Debug)]
pub struct JwsHeader<'a> {
    pub alg: &'a str,
    pub typ: &'a str,
    pub kid: &'a str,
}

impl JwsHeader<'_> {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(&self).map_err(CredentialsError::non_retryable)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    fn decode(s: &str) -> Value {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(s).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn claims() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let then = now + Duration::from_secs(3600);
        let claims = JwsClaims {
            iss: "sa-id".to_string(),
            sub: "sa-id".to_string(),
            aud: "https://auth.example.com/oauth/token".to_string(),
            iat: now,
            exp: then,
        };
        let v = decode(&claims.encode().unwrap());
        assert_eq!(v["iss"], "sa-id");
        assert_eq!(v["sub"], "sa-id");
        assert_eq!(v["aud"], "https://auth.example.com/oauth/token");
        assert_eq!(v["iat"], 1_700_000_000);
        assert_eq!(v["exp"], 1_700_003_600);
    }

    #[test]
    fn claims_exp_before_iat() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let claims = JwsClaims {
            iss: "sa-id".to_string(),
            sub: "sa-id".to_string(),
            aud: "aud".to_string(),
            iat: now,
            exp: now - Duration::from_secs(1),
        };
        let err = claims.encode().unwrap_err();
        assert!(!err.is_retryable(), "{err:?}");
        assert!(err.to_string().contains("must be later than issued time"), "{err}");
    }

    #[test]
    fn header() {
        let header = JwsHeader {
            alg: "PS256",
            typ: "JWT",
            kid: "key-id",
        };
        let v = decode(&header.encode().unwrap());
        assert_eq!(v["alg"], "PS256");
        assert_eq!(v["typ"], "JWT");
        assert_eq!(v["kid"], "key-id");
    }
}
