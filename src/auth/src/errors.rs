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

//! Common errors generated by the components in this crate.

pub use gax::error::CredentialsError;

/// The error message returned by [NoCredentials].
///
/// [NoCredentials]: crate::credentials::Credentials::none
pub const UNAUTHENTICATED: &str = "unauthenticated connection";

/// Returns `true` for HTTP status codes where a new attempt may succeed.
pub(crate) fn is_retryable(c: http::StatusCode) -> bool {
    matches!(
        c,
        http::StatusCode::SERVICE_UNAVAILABLE
            | http::StatusCode::REQUEST_TIMEOUT
            | http::StatusCode::TOO_MANY_REQUESTS
            | http::StatusCode::INTERNAL_SERVER_ERROR
            | http::StatusCode::BAD_GATEWAY
            | http::StatusCode::GATEWAY_TIMEOUT
    )
}
