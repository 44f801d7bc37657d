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

//! DoubleCloud Client Libraries for Rust - Authentication Components
//!
//! This crate contains types and functions used to authenticate applications
//! with the DoubleCloud API. The SDK clients consume a
//! [credentials::Credentials] value and use it to obtain the IAM tokens that
//! authenticate each RPC issued by the application.
//!
//! There are two families of credentials:
//!
//! * Exchangeable credentials, such as [service account keys], produce a
//!   signed assertion. The assertion must be exchanged for an IAM token using
//!   the [exchange::Exchanger].
//! * Non-exchangeable credentials, such as a [static IAM token] or the
//!   [federation flow], produce IAM tokens directly.
//!
//! Most applications do not need to handle either family directly. The
//! [token_source::TokenSource] type hides the difference, and caches tokens
//! until they expire.
//!
//! [service account keys]: credentials::service_account
//! [static IAM token]: credentials::iam_token
//! [federation flow]: credentials::federation

pub mod build_errors;
pub mod clock;
pub mod credentials;
pub mod errors;
pub mod exchange;
pub mod token;
pub mod token_source;

pub(crate) mod constants;
pub(crate) mod token_cache;
pub(crate) mod token_file;

/// A `Result` alias where the `Err` case is `doublecloud_auth::errors::CredentialsError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;

/// A `Result` alias where the `Err` case is [build_errors::Error].
pub type BuildResult<T> = std::result::Result<T, build_errors::Error>;
