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

use std::time::Duration;

/// The endpoint that exchanges signed assertions for IAM tokens.
pub(crate) const OAUTH2_TOKEN_SERVER_URL: &str = "https://auth.double.cloud/oauth/token";
/// JWT Bearer OAuth Grant Type.
pub(crate) const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// The lifetime of the signed assertions.
pub(crate) const DEFAULT_ASSERTION_TIMEOUT: Duration = Duration::from_secs(3600);

/// The default endpoint for the federation flow.
pub(crate) const FEDERATION_ENDPOINT: &str = "https://auth.double.cloud";
/// The path, relative to the federation endpoint, where federations live.
pub(crate) const FEDERATION_PATH: &str = "federations";
/// The default cache directory, relative to the user home.
pub(crate) const TOKEN_CACHE_DIR: &str = ".dcsdk";

pub(crate) const USER_AGENT: &str = concat!("doublecloud-rust-sdk/", env!("CARGO_PKG_VERSION"));
pub(crate) const BEARER: &str = "Bearer";
