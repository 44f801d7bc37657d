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

use gax::error::{Error, Status};
use std::error::Error as _;

fn as_inner<T>(status: &tonic::Status) -> Option<&T>
where
    T: std::error::Error + 'static,
{
    let mut e = status.source()?;
    // Prevent infinite loops due to cycles in the `source()` errors.
    for _ in 0..32 {
        if let Some(value) = e.downcast_ref::<T>() {
            return Some(value);
        }
        e = e.source()?;
    }
    None
}

/// Converts the status returned by a call to `address`.
pub fn to_gax_error(address: &str, status: tonic::Status) -> Error {
    if as_inner::<tonic::TimeoutExpired>(&status).is_some() {
        return Error::timeout(status);
    }
    if as_inner::<tonic::ConnectError>(&status).is_some() {
        return Error::connect(address, status);
    }
    if as_inner::<tonic::transport::Error>(&status).is_some() {
        return Error::io(status);
    }
    let gax_status = Status::new(status.code() as i32, status.message());
    Error::service_with_source(gax_status, status)
}
